//! Build-integrity ("blessed build") classification.
//!
//! Blessed, unmodified builds resolve unrecovered fatal errors with a quiet
//! process exit; anything else lets the host's native crash machinery run so
//! developers get full diagnostics. The classification gives the benefit of
//! the doubt while the runtime hash calculation is still in flight.

use crate::state::EngineState;

/// Integrity hash embedded by release packaging; `None` on unblessed builds.
/// Set automatically by the packaging pipeline; don't change here.
pub const EMBEDDED_INTEGRITY_HASH: Option<&str> = None;

/// Static facts about the running build.
#[derive(Debug, Clone)]
pub struct BuildManifest {
    /// Whether this is a debug build.
    pub debug: bool,
    /// Integrity hash embedded at packaging time, if any.
    pub embedded_hash: Option<String>,
    /// Whether application logic is loaded from a non-standard location.
    pub custom_script_dir: bool,
}

impl BuildManifest {
    /// Manifest for the running build.
    #[must_use]
    pub fn current(custom_script_dir: bool) -> Self {
        Self {
            debug: cfg!(debug_assertions),
            embedded_hash: EMBEDDED_INTEGRITY_HASH.map(str::to_string),
            custom_script_dir,
        }
    }
}

/// Whether the running build is classified as pristine and official.
///
/// Debug builds are never blessed. A build where the user ran arbitrary
/// commands, or that loads scripts from a custom location, is considered
/// modified. Without an embedded hash there is nothing to be blessed
/// against. When an embedded hash exists but the runtime calculation has not
/// completed (state absent, hash unset, or empty) the build is assumed
/// clean; once calculated, the hashes must match.
#[must_use]
pub fn is_unmodified_blessed_build(manifest: &BuildManifest, state: Option<&EngineState>) -> bool {
    if manifest.debug {
        return false;
    }
    if state.is_some_and(EngineState::user_ran_commands) {
        return false;
    }
    if manifest.custom_script_dir {
        return false;
    }
    let Some(embedded) = manifest.embedded_hash.as_deref() else {
        return false;
    };
    match state.and_then(EngineState::calculated_integrity_hash) {
        None => true,
        Some(calculated) if calculated.is_empty() => true,
        Some(calculated) => calculated == embedded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DeviceCaps, EngineSettings};

    fn release_manifest() -> BuildManifest {
        BuildManifest {
            debug: false,
            embedded_hash: Some("feedface".to_string()),
            custom_script_dir: false,
        }
    }

    fn test_state() -> EngineState {
        EngineState::new(
            &EngineSettings::default(),
            &DeviceCaps {
                logical_cpus: 1,
                stdin_is_terminal: false,
            },
        )
    }

    #[test]
    fn debug_builds_are_never_blessed() {
        let manifest = BuildManifest {
            debug: true,
            ..release_manifest()
        };
        assert!(!is_unmodified_blessed_build(&manifest, None));
        assert!(!is_unmodified_blessed_build(&manifest, Some(&test_state())));
    }

    #[test]
    fn user_commands_void_the_blessing() {
        let state = test_state();
        state.set_user_ran_commands();
        assert!(!is_unmodified_blessed_build(&release_manifest(), Some(&state)));
    }

    #[test]
    fn custom_script_dir_counts_as_modified() {
        let manifest = BuildManifest {
            custom_script_dir: true,
            ..release_manifest()
        };
        assert!(!is_unmodified_blessed_build(&manifest, Some(&test_state())));
    }

    #[test]
    fn missing_embedded_hash_is_unblessed() {
        let manifest = BuildManifest {
            embedded_hash: None,
            ..release_manifest()
        };
        assert!(!is_unmodified_blessed_build(&manifest, Some(&test_state())));
    }

    #[test]
    fn pending_calculation_gets_benefit_of_the_doubt() {
        // State not constructed yet (very early fatal) or hash not calculated.
        assert!(is_unmodified_blessed_build(&release_manifest(), None));
        let state = test_state();
        assert!(is_unmodified_blessed_build(&release_manifest(), Some(&state)));
        assert!(state.set_calculated_integrity_hash(String::new()));
        assert!(is_unmodified_blessed_build(&release_manifest(), Some(&state)));
    }

    #[test]
    fn matching_hash_stays_blessed() {
        let state = test_state();
        assert!(state.set_calculated_integrity_hash("feedface".to_string()));
        assert!(is_unmodified_blessed_build(&release_manifest(), Some(&state)));
    }

    #[test]
    fn mismatched_hash_is_unblessed() {
        let state = test_state();
        assert!(state.set_calculated_integrity_hash("deadbeef".to_string()));
        assert!(!is_unmodified_blessed_build(&release_manifest(), Some(&state)));
    }
}
