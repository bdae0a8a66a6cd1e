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

//! Telemetry primitives shared across the Ember workspace.
//!
//! Layout: `init.rs` (tracing subscriber setup and logging configuration),
//! `metrics.rs` (Prometheus registry for engine counters), `sink.rs`
//! (dual-destination log sink with the remote upload buffer).

pub mod init;
pub mod metrics;
pub mod sink;

pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
pub use sink::{DEFAULT_REMOTE_CAPACITY, LogSink, RemoteLogEntry};
