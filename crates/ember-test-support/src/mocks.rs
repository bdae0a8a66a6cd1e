//! Controllable stand-ins for platform-provided behavior.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ember_core::{FatalTrigger, RecoveryHook, TickSource};

/// Tick source whose reading is set explicitly by the test.
#[derive(Debug, Default)]
pub struct ManualTicks {
    ticks: AtomicU64,
}

impl ManualTicks {
    /// Construct a tick source starting at `start` milliseconds.
    #[must_use]
    pub const fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Set the raw tick reading. The next query observes this value.
    pub fn set(&self, value: u64) {
        self.ticks.store(value, Ordering::SeqCst);
    }

    /// Move the raw tick reading forward by `delta` milliseconds.
    pub fn advance(&self, delta: u64) {
        self.ticks.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TickSource for ManualTicks {
    fn ticks_ms(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

/// Recovery hook that records every call and answers with a fixed verdict.
#[derive(Debug)]
pub struct RecordingHook {
    handled: bool,
    calls: Mutex<Vec<(bool, FatalTrigger)>>,
}

impl RecordingHook {
    /// Construct a hook whose `try_recover` always returns `handled`.
    #[must_use]
    pub const fn new(handled: bool) -> Self {
        Self {
            handled,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The `(clean_exit, trigger)` arguments of every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(bool, FatalTrigger)> {
        self.calls.lock().expect("hook call mutex poisoned").clone()
    }
}

impl RecoveryHook for RecordingHook {
    fn try_recover(&self, clean_exit: bool, trigger: FatalTrigger) -> bool {
        self.calls
            .lock()
            .expect("hook call mutex poisoned")
            .push((clean_exit, trigger));
        self.handled
    }
}
