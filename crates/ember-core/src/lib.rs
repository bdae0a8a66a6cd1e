#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Bootstrap and cross-subsystem coordination core of the Ember engine.
//!
//! Layout: `state.rs` (process state registry), `clock.rs` (glitch-filtered
//! monotonic time), `session.rs` (process-unique session identifier),
//! `thread.rs`/`module.rs`/`registry.rs` (thread-affined subsystem registry),
//! `integrity.rs`/`fatal.rs` (blessed-build policy and fatal-error protocol),
//! `context.rs` (the engine context exposing the public query surface).

pub mod clock;
pub mod context;
pub mod error;
pub mod fatal;
pub mod integrity;
pub mod module;
pub mod registry;
pub mod session;
pub mod state;
pub mod thread;

pub use clock::{DEFAULT_MAX_STEP_MS, RealTimeClock, SystemTicks, TickSource};
pub use context::EngineContext;
pub use error::{CoreError, CoreResult};
pub use fatal::{FatalHandler, FatalOutcome, FatalTrigger, NullRecoveryHook, RecoveryHook};
pub use integrity::{BuildManifest, EMBEDDED_INTEGRITY_HASH, is_unmodified_blessed_build};
pub use module::{Module, ModuleKind, REQUIRED_MODULES};
pub use registry::ThreadRegistry;
pub use session::{SESSION_ID_WARN_LEN, SessionIdentity};
pub use state::{DeviceCaps, EngineSettings, EngineState, UiScale};
pub use thread::{EngineThread, ThreadId, ThreadMessage};
