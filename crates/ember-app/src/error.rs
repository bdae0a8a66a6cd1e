//! # Design
//!
//! - Centralize application-level errors for bootstrap and platform glue.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use ember_core::{CoreError, FatalTrigger};

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Core registry or thread operations failed.
    #[error("core operation failed")]
    Core {
        /// Operation identifier.
        operation: &'static str,
        /// Source core error.
        source: CoreError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// A fatal error was reported and the recovery hook handled it.
    #[error("fatal error")]
    Fatal {
        /// Message given to the fatal-error entry point.
        message: String,
        /// How the fatal path was entered.
        trigger: FatalTrigger,
    },
}

impl AppError {
    pub(crate) const fn core(operation: &'static str, source: CoreError) -> Self {
        Self::Core { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn io(
        operation: &'static str,
        path: Option<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path,
            source,
        }
    }
}
