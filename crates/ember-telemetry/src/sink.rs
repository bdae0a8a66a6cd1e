//! Dual-destination log sink.
//!
//! Every message carries two independent destinations: the local console
//! (routed through `tracing`) and the remote diagnostic server. The remote
//! side is a bounded in-memory buffer; the transport that uploads drained
//! batches is an external collaborator. When the buffer overflows the oldest
//! entries are dropped and counted.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::metrics::Metrics;

/// Default capacity of the remote upload buffer.
pub const DEFAULT_REMOTE_CAPACITY: usize = 1_024;

/// A log line queued for the remote diagnostic server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RemoteLogEntry {
    /// Time the line was emitted.
    pub timestamp: DateTime<Utc>,
    /// The message text.
    pub message: String,
}

/// Log sink with independent console and remote destinations.
pub struct LogSink {
    remote: Mutex<VecDeque<RemoteLogEntry>>,
    capacity: usize,
    metrics: Metrics,
}

impl LogSink {
    /// Construct a sink with the default remote buffer capacity.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self::with_capacity(DEFAULT_REMOTE_CAPACITY, metrics)
    }

    /// Construct a sink with an explicit remote buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize, metrics: Metrics) -> Self {
        Self {
            remote: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            metrics,
        }
    }

    /// Emit a message to the selected destinations.
    pub fn emit(&self, message: &str, to_console: bool, to_server: bool) {
        if to_console {
            info!(target: "ember::console", "{message}");
        }
        if to_server {
            let mut buffer = self.remote.lock().expect("remote log mutex poisoned");
            if buffer.len() == self.capacity {
                buffer.pop_front();
                self.metrics.inc_remote_log_dropped();
            }
            buffer.push_back(RemoteLogEntry {
                timestamp: Utc::now(),
                message: message.to_string(),
            });
        }
    }

    /// Hand the queued remote entries to the upload transport.
    #[must_use]
    pub fn drain_remote(&self) -> Vec<RemoteLogEntry> {
        let mut buffer = self.remote.lock().expect("remote log mutex poisoned");
        buffer.drain(..).collect()
    }

    /// Number of entries currently queued for the remote server.
    #[must_use]
    pub fn remote_len(&self) -> usize {
        self.remote.lock().expect("remote log mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn console_only_messages_skip_remote_buffer() -> Result<()> {
        let sink = LogSink::new(Metrics::new()?);
        sink.emit("console only", true, false);
        assert_eq!(sink.remote_len(), 0);
        Ok(())
    }

    #[test]
    fn remote_messages_are_queued_and_drained() -> Result<()> {
        let sink = LogSink::new(Metrics::new()?);
        sink.emit("first", false, true);
        sink.emit("second", true, true);
        let drained = sink.drain_remote();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "first");
        assert_eq!(sink.remote_len(), 0);
        Ok(())
    }

    #[test]
    fn overflow_drops_oldest_and_counts() -> Result<()> {
        let metrics = Metrics::new()?;
        let sink = LogSink::with_capacity(2, metrics.clone());
        sink.emit("a", false, true);
        sink.emit("b", false, true);
        sink.emit("c", false, true);
        let drained = sink.drain_remote();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "b");
        assert_eq!(metrics.snapshot().remote_log_dropped_total, 1);
        Ok(())
    }
}
