//! Event-loop ownership.
//!
//! Two host shapes exist: standalone hosts hand the main thread to the
//! engine, which runs the event loop until quit is requested; host-driven
//! embedders keep their own main loop and only let the engine pump pending
//! work.

use std::sync::Arc;
use std::time::Duration;

use ember_core::{EngineContext, EngineThread};

use crate::error::{AppError, AppResult};

/// How the hosting application relates to the main-thread event loop.
pub trait Application: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the engine owns and runs the main-thread event loop.
    fn uses_event_loop(&self) -> bool;

    /// Hook run on the bootstrap thread once the bootstrapped flag is
    /// published.
    ///
    /// # Errors
    ///
    /// Returns an error when post-bootstrap application work fails.
    fn on_bootstrap_complete(&self, _ctx: &Arc<EngineContext>) -> AppResult<()> {
        Ok(())
    }

    /// For host-driven applications: process pending main-thread work once.
    /// Returns the number of closures executed.
    ///
    /// # Errors
    ///
    /// Returns an error when the main thread's mailbox is unavailable.
    fn prime_event_pump(&self, main: &Arc<EngineThread>) -> AppResult<usize> {
        main.pump_until_idle(Duration::from_millis(50))
            .map_err(|source| AppError::core("main.pump_until_idle", source))
    }
}

/// Standalone host: the engine blocks in the main-thread event loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneApplication;

impl Application for StandaloneApplication {
    fn name(&self) -> &'static str {
        "standalone"
    }

    fn uses_event_loop(&self) -> bool {
        true
    }
}

/// Host-driven embedder: the surrounding environment drives the main loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDrivenApplication;

impl Application for HostDrivenApplication {
    fn name(&self) -> &'static str {
        "host-driven"
    }

    fn uses_event_loop(&self) -> bool {
        false
    }
}
