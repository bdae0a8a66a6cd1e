//! Prometheus-backed metrics registry for the engine core.
//!
//! Counters cover the paths with failure-mode subtlety: fatal-error reports,
//! clock glitch filtering, screen-message fallbacks, thread spawns, and
//! remote log overflow. The registry is cheap to clone and share.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across the engine.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    fatal_reports_total: IntCounterVec,
    clock_clamped_steps_total: IntCounter,
    clock_backward_steps_total: IntCounter,
    screen_message_fallbacks_total: IntCounter,
    threads_spawned_total: IntCounterVec,
    remote_log_dropped_total: IntCounter,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Raw tick deltas capped at the maximum step.
    pub clock_clamped_steps_total: u64,
    /// Raw tick deltas observed running backwards.
    pub clock_backward_steps_total: u64,
    /// Screen messages downgraded to log lines.
    pub screen_message_fallbacks_total: u64,
    /// Remote log entries dropped because the buffer was full.
    pub remote_log_dropped_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fatal_reports_total = IntCounterVec::new(
            Opts::new("fatal_reports_total", "Fatal errors reported by trigger"),
            &["trigger"],
        )?;
        let clock_clamped_steps_total = IntCounter::with_opts(Opts::new(
            "clock_clamped_steps_total",
            "Real-time tick deltas capped at the maximum step",
        ))?;
        let clock_backward_steps_total = IntCounter::with_opts(Opts::new(
            "clock_backward_steps_total",
            "Real-time tick deltas that ran backwards and were zeroed",
        ))?;
        let screen_message_fallbacks_total = IntCounter::with_opts(Opts::new(
            "screen_message_fallbacks_total",
            "Screen messages downgraded to log lines before the game module existed",
        ))?;
        let threads_spawned_total = IntCounterVec::new(
            Opts::new("threads_spawned_total", "Engine worker threads spawned"),
            &["thread"],
        )?;
        let remote_log_dropped_total = IntCounter::with_opts(Opts::new(
            "remote_log_dropped_total",
            "Remote log entries dropped due to buffer overflow",
        ))?;

        registry.register(Box::new(fatal_reports_total.clone()))?;
        registry.register(Box::new(clock_clamped_steps_total.clone()))?;
        registry.register(Box::new(clock_backward_steps_total.clone()))?;
        registry.register(Box::new(screen_message_fallbacks_total.clone()))?;
        registry.register(Box::new(threads_spawned_total.clone()))?;
        registry.register(Box::new(remote_log_dropped_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                fatal_reports_total,
                clock_clamped_steps_total,
                clock_backward_steps_total,
                screen_message_fallbacks_total,
                threads_spawned_total,
                remote_log_dropped_total,
            }),
        })
    }

    /// Increment the fatal-report counter for the given trigger label.
    pub fn inc_fatal_report(&self, trigger: &str) {
        self.inner
            .fatal_reports_total
            .with_label_values(&[trigger])
            .inc();
    }

    /// Increment the counter for tick deltas capped at the maximum step.
    pub fn inc_clock_clamped(&self) {
        self.inner.clock_clamped_steps_total.inc();
    }

    /// Increment the counter for tick deltas that ran backwards.
    pub fn inc_clock_backward(&self) {
        self.inner.clock_backward_steps_total.inc();
    }

    /// Increment the counter for screen messages downgraded to log lines.
    pub fn inc_screen_message_fallback(&self) {
        self.inner.screen_message_fallbacks_total.inc();
    }

    /// Increment the spawned-thread counter for the given thread label.
    pub fn inc_thread_spawned(&self, thread: &str) {
        self.inner
            .threads_spawned_total
            .with_label_values(&[thread])
            .inc();
    }

    /// Increment the counter for dropped remote log entries.
    pub fn inc_remote_log_dropped(&self) {
        self.inner.remote_log_dropped_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the scalar counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clock_clamped_steps_total: self.inner.clock_clamped_steps_total.get(),
            clock_backward_steps_total: self.inner.clock_backward_steps_total.get(),
            screen_message_fallbacks_total: self.inner.screen_message_fallbacks_total.get(),
            remote_log_dropped_total: self.inner.remote_log_dropped_total.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_rendered_output() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_fatal_report("explicit");
        metrics.inc_clock_clamped();
        metrics.inc_thread_spawned("game");
        let rendered = metrics.render()?;
        assert!(rendered.contains("fatal_reports_total"));
        assert!(rendered.contains("clock_clamped_steps_total"));
        Ok(())
    }

    #[test]
    fn snapshot_reflects_increments() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_clock_backward();
        metrics.inc_clock_backward();
        metrics.inc_remote_log_dropped();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.clock_backward_steps_total, 2);
        assert_eq!(snapshot.remote_log_dropped_total, 1);
        assert_eq!(snapshot.clock_clamped_steps_total, 0);
        Ok(())
    }

    #[test]
    fn snapshot_serialises_to_json() -> Result<()> {
        let metrics = Metrics::new()?;
        let json = serde_json::to_value(metrics.snapshot())?;
        assert!(json.get("clock_clamped_steps_total").is_some());
        Ok(())
    }
}
