//! Process-wide state registry.
//!
//! One `EngineState` exists per process. It is created before anything else
//! and shared as `Arc`. Every field has exactly one writing owner: identity
//! fields are fixed at construction, the bootstrapped flag belongs to the
//! bootstrap sequencer, and the behavioral flags belong to application logic.
//! Write-once fields use `OnceCell`; the rest are atomics.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Interface scale bucket for the user interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiScale {
    /// Phone-sized interfaces.
    Small,
    /// Tablet-sized interfaces.
    #[default]
    Medium,
    /// Desktop-sized interfaces.
    Large,
}

/// Settings derived from the command line, consumed at state construction.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Whether the process runs in VR mode.
    pub vr_mode: bool,
    /// Explicit interface scale, if the launcher selected one.
    pub ui_scale: Option<UiScale>,
    /// Whether application logic is loaded from a non-standard location.
    pub custom_script_dir: bool,
}

/// Device-capability helper captured once at startup.
#[derive(Debug, Clone)]
pub struct DeviceCaps {
    /// Logical CPU count reported by the OS.
    pub logical_cpus: usize,
    /// Whether stdin is attached to a terminal.
    pub stdin_is_terminal: bool,
}

impl DeviceCaps {
    /// Probe the current device.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            logical_cpus: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            stdin_is_terminal: std::io::stdin().is_terminal(),
        }
    }
}

/// Singleton-lifetime record of process-wide state.
#[derive(Debug)]
pub struct EngineState {
    bootstrapped: AtomicBool,
    ui_scale: OnceCell<UiScale>,
    vr_mode: bool,
    return_value: AtomicI32,
    user_ran_commands: AtomicBool,
    calculated_integrity_hash: OnceCell<String>,
    stdin_is_terminal: bool,
    main_thread_id: thread::ThreadId,
}

impl EngineState {
    /// Construct the process state. Must be called on the main thread, which
    /// is recorded for the main-thread affinity predicate.
    #[must_use]
    pub fn new(settings: &EngineSettings, caps: &DeviceCaps) -> Self {
        let state = Self {
            bootstrapped: AtomicBool::new(false),
            ui_scale: OnceCell::new(),
            vr_mode: settings.vr_mode,
            return_value: AtomicI32::new(0),
            user_ran_commands: AtomicBool::new(false),
            calculated_integrity_hash: OnceCell::new(),
            stdin_is_terminal: caps.stdin_is_terminal,
            main_thread_id: thread::current().id(),
        };
        if let Some(scale) = settings.ui_scale {
            let _ = state.ui_scale.set(scale);
        }
        state
    }

    /// Whether bootstrap has completed (acquire load).
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    /// Publish the bootstrapped flag (release store). Transitions exactly
    /// once from false to true.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyBootstrapped`] when the flag was already
    /// published.
    pub fn mark_bootstrapped(&self) -> CoreResult<()> {
        self.bootstrapped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::AlreadyBootstrapped)?;
        Ok(())
    }

    /// Current interface scale; defaults to medium until a platform sets it.
    #[must_use]
    pub fn ui_scale(&self) -> UiScale {
        self.ui_scale.get().copied().unwrap_or_default()
    }

    /// Record the interface scale. Returns false if a scale was already set.
    pub fn set_ui_scale(&self, scale: UiScale) -> bool {
        self.ui_scale.set(scale).is_ok()
    }

    /// Whether the process runs in VR mode.
    #[must_use]
    pub const fn vr_mode(&self) -> bool {
        self.vr_mode
    }

    /// Process exit code to use on normal termination.
    #[must_use]
    pub fn return_value(&self) -> i32 {
        self.return_value.load(Ordering::Relaxed)
    }

    /// Set the process exit code used on normal termination.
    pub fn set_return_value(&self, value: i32) {
        self.return_value.store(value, Ordering::Relaxed);
    }

    /// Whether the user has executed arbitrary commands this session.
    #[must_use]
    pub fn user_ran_commands(&self) -> bool {
        self.user_ran_commands.load(Ordering::Relaxed)
    }

    /// Record that the user executed an arbitrary command. Sticky.
    pub fn set_user_ran_commands(&self) {
        self.user_ran_commands.store(true, Ordering::Relaxed);
    }

    /// Runtime-calculated integrity hash, once the calculation has finished.
    #[must_use]
    pub fn calculated_integrity_hash(&self) -> Option<&str> {
        self.calculated_integrity_hash.get().map(String::as_str)
    }

    /// Publish the runtime-calculated integrity hash. Returns false if a
    /// hash was already published.
    pub fn set_calculated_integrity_hash(&self, hash: String) -> bool {
        self.calculated_integrity_hash.set(hash).is_ok()
    }

    /// Whether stdin was attached to a terminal at startup.
    #[must_use]
    pub const fn stdin_is_terminal(&self) -> bool {
        self.stdin_is_terminal
    }

    /// Whether the calling thread is the one that constructed the state.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(settings: &EngineSettings) -> EngineState {
        let caps = DeviceCaps {
            logical_cpus: 4,
            stdin_is_terminal: false,
        };
        EngineState::new(settings, &caps)
    }

    #[test]
    fn bootstrapped_transitions_exactly_once() {
        let state = test_state(&EngineSettings::default());
        assert!(!state.is_bootstrapped());
        state.mark_bootstrapped().expect("first transition");
        assert!(state.is_bootstrapped());
        assert!(matches!(
            state.mark_bootstrapped(),
            Err(CoreError::AlreadyBootstrapped)
        ));
        assert!(state.is_bootstrapped());
    }

    #[test]
    fn ui_scale_defaults_until_set() {
        let state = test_state(&EngineSettings::default());
        assert_eq!(state.ui_scale(), UiScale::Medium);
        assert!(state.set_ui_scale(UiScale::Large));
        assert!(!state.set_ui_scale(UiScale::Small));
        assert_eq!(state.ui_scale(), UiScale::Large);
    }

    #[test]
    fn ui_scale_from_settings_wins() {
        let settings = EngineSettings {
            ui_scale: Some(UiScale::Small),
            ..EngineSettings::default()
        };
        let state = test_state(&settings);
        assert_eq!(state.ui_scale(), UiScale::Small);
        assert!(!state.set_ui_scale(UiScale::Large));
    }

    #[test]
    fn integrity_hash_is_write_once() {
        let state = test_state(&EngineSettings::default());
        assert_eq!(state.calculated_integrity_hash(), None);
        assert!(state.set_calculated_integrity_hash("abc".to_string()));
        assert!(!state.set_calculated_integrity_hash("def".to_string()));
        assert_eq!(state.calculated_integrity_hash(), Some("abc"));
    }

    #[test]
    fn constructing_thread_is_main() {
        let state = test_state(&EngineSettings::default());
        assert!(state.is_main_thread());
        let state = std::sync::Arc::new(state);
        let shared = state.clone();
        let handle = std::thread::spawn(move || shared.is_main_thread());
        assert!(!handle.join().expect("join probe thread"));
    }
}
