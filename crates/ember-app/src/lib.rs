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

//! Engine host: the phased boot sequence and its platform glue.
//!
//! Layout: `bootstrap.rs` (boot phases and the fatal-outcome driver),
//! `platform.rs` (host environment adapter), `application.rs` (event-loop
//! ownership), `modules.rs` (subsystem modules), `cli.rs` (launch options),
//! `error.rs` (application errors).

pub mod application;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod modules;
pub mod platform;

pub use application::{Application, HostDrivenApplication, StandaloneApplication};
pub use bootstrap::{BootstrapDependencies, CRASH_TEST_ENV, run_app, run_app_with};
pub use cli::{LaunchOptions, LogFormatArg, UiScaleArg};
pub use error::{AppError, AppResult};
pub use modules::{
    AudioServerModule, BgSimulationModule, GameModule, GraphicsServerModule, MediaServerModule,
    NetworkWriterModule, StdinReaderModule,
};
pub use platform::{NativePlatform, PlatformAdapter};
