//! # Design
//!
//! - Centralize core registry and thread lifecycle errors.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Registry misuse (duplicate threads, duplicate module homes) is programmer
//!   error; it is surfaced as a value so the bootstrap driver can escalate it
//!   through the fatal protocol instead of unwinding.

use std::io;

use thiserror::Error;

use crate::module::ModuleKind;
use crate::thread::ThreadId;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core-level error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A thread with the given identifier already exists.
    #[error("thread already exists")]
    ThreadExists {
        /// Identifier of the duplicated thread.
        id: ThreadId,
    },
    /// A thread with the given identifier was never created.
    #[error("thread missing")]
    ThreadMissing {
        /// Identifier of the missing thread.
        id: ThreadId,
    },
    /// A module of the given kind already has a home thread.
    #[error("module already attached")]
    ModuleAlreadyAttached {
        /// Kind of the duplicated module.
        kind: ModuleKind,
    },
    /// A required module was not attached before bootstrap completion.
    #[error("required module missing")]
    MissingModule {
        /// Kind of the missing module.
        kind: ModuleKind,
    },
    /// The bootstrapped flag was already published.
    #[error("already bootstrapped")]
    AlreadyBootstrapped,
    /// The OS refused to spawn a worker thread.
    #[error("thread spawn failed")]
    ThreadSpawn {
        /// Identifier of the thread that failed to spawn.
        id: ThreadId,
        /// Source IO error.
        source: io::Error,
    },
    /// The mailbox of the target thread is closed.
    #[error("mailbox closed")]
    MailboxClosed {
        /// Identifier of the unreachable thread.
        id: ThreadId,
    },
    /// The event loop of the thread is not available to this caller.
    #[error("event loop unavailable")]
    EventLoopUnavailable {
        /// Identifier of the thread whose loop was requested.
        id: ThreadId,
    },
}
