//! Process-unique session identifier.
//!
//! The identifier correlates diagnostic and telemetry events for one process
//! lifetime. It is computed on first demand, not at bootstrap, and never
//! changes afterwards. First-call races are resolved by the cell: concurrent
//! callers compute exactly once.

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// Length at which the identifier is considered anomalously long.
pub const SESSION_ID_WARN_LEN: usize = 100;

/// Lazily-computed, process-lifetime-unique session identifier.
#[derive(Debug)]
pub struct SessionIdentity {
    device_id: String,
    cached: OnceCell<String>,
}

impl SessionIdentity {
    /// Construct the identity around the platform's device identifier.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            cached: OnceCell::new(),
        }
    }

    /// The device identifier supplied at construction.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The session identifier; computed once, identical on every call.
    ///
    /// An identifier of [`SESSION_ID_WARN_LEN`] characters or more is a known
    /// soft anomaly: a warning is logged and the value is used as-is.
    pub fn id(&self) -> &str {
        self.cached.get_or_init(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| {
                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
                });
            let mut rng = StdRng::seed_from_u64(seed);
            let salt: u32 = rng.random();
            let id = format!("{}{salt}", self.device_id);
            if id.len() >= SESSION_ID_WARN_LEN {
                warn!(length = id.len(), "session identifier longer than expected");
            }
            id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_idempotent() {
        let identity = SessionIdentity::new("device-1234");
        let first = identity.id().to_string();
        let second = identity.id().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn id_carries_device_prefix_and_salt() {
        let identity = SessionIdentity::new("device-1234");
        let id = identity.id();
        assert!(id.starts_with("device-1234"));
        let suffix = &id["device-1234".len()..];
        assert!(!suffix.is_empty());
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn oversized_identifier_is_still_returned() {
        let device = "x".repeat(SESSION_ID_WARN_LEN);
        let identity = SessionIdentity::new(device.clone());
        let id = identity.id();
        assert!(id.len() >= SESSION_ID_WARN_LEN);
        assert!(id.starts_with(&device));
    }

    #[test]
    fn concurrent_first_calls_agree() {
        let identity = std::sync::Arc::new(SessionIdentity::new("dev"));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let shared = identity.clone();
            handles.push(std::thread::spawn(move || shared.id().to_string()));
        }
        let mut ids: Vec<String> = handles
            .into_iter()
            .map(|handle| handle.join().expect("join session probe"))
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }
}
