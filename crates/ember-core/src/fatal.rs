//! Fatal-error escalation protocol.
//!
//! Two observable stages: **report** (always happens; the message is logged
//! locally and queued for the remote diagnostic server) and
//! **recover-or-terminate** (the recovery hook may intercept; otherwise the
//! blessed-build classification decides between a quiet exit and native
//! crash capture). The decision is returned as a value and matched by the
//! caller; this path never unwinds on its own and is safe to use before any
//! other engine state exists.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use ember_telemetry::{LogSink, Metrics};

/// Why the fatal path was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalTrigger {
    /// Application code detected an unrecoverable invariant violation and
    /// called the fatal-error entry point directly.
    Explicit,
    /// An error escaped the entire bootstrap-and-run sequence.
    EscapedError,
}

impl FatalTrigger {
    /// Metrics/log label for this trigger.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::EscapedError => "escaped_error",
        }
    }
}

impl fmt::Display for FatalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Environment hook given a chance to intercept a fatal error (for example
/// by displaying it in a host-provided dialog).
pub trait RecoveryHook: Send + Sync {
    /// Attempt recovery. `clean_exit` reports whether the default resolution
    /// would be a quiet process exit. Returns true when the environment
    /// handled the error itself and execution may resume.
    fn try_recover(&self, clean_exit: bool, trigger: FatalTrigger) -> bool;
}

/// Default hook: never recovers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecoveryHook;

impl RecoveryHook for NullRecoveryHook {
    fn try_recover(&self, _clean_exit: bool, _trigger: FatalTrigger) -> bool {
        false
    }
}

/// Resolution of a fatal error, matched by the top-level driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalOutcome {
    /// The recovery hook intercepted the error; execution may resume.
    Recovered,
    /// Terminate the process with the given exit code.
    Exit(i32),
    /// Let the host environment's abnormal-termination machinery run.
    Escalate,
}

/// The report-then-recover-or-terminate protocol.
pub struct FatalHandler {
    hook: Box<dyn RecoveryHook>,
    sink: Arc<LogSink>,
    metrics: Metrics,
}

impl FatalHandler {
    /// Construct the handler around a recovery hook.
    #[must_use]
    pub const fn new(hook: Box<dyn RecoveryHook>, sink: Arc<LogSink>, metrics: Metrics) -> Self {
        Self {
            hook,
            sink,
            metrics,
        }
    }

    /// Report stage: persist and transmit the message. Always performed,
    /// independent of the recovery outcome.
    pub fn report(&self, message: &str, trigger: FatalTrigger) {
        self.metrics.inc_fatal_report(trigger.label());
        error!(trigger = trigger.label(), "{message}");
        self.sink.emit(&format!("FATAL: {message}"), false, true);
    }

    /// Recover-or-terminate stage. `blessed` is the build-integrity
    /// classification at the moment of failure.
    pub fn resolve(&self, blessed: bool, trigger: FatalTrigger) -> FatalOutcome {
        // Trusted unmodified builds exit quietly; everything else surfaces
        // native diagnostics.
        let clean_exit = !blessed;
        if self.hook.try_recover(clean_exit, trigger) {
            FatalOutcome::Recovered
        } else if clean_exit {
            FatalOutcome::Exit(1)
        } else {
            FatalOutcome::Escalate
        }
    }
}
