//! Pairing — binding an unconfigured terminal to a device record.
//!
//! The terminal shows a short code; an administrator enters it in the admin
//! application, which binds it to a device. Codes expire after
//! [`PAIRING_CODE_TTL`] and are never reused after that.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, PairingCode};
use crate::time::Timestamp;

/// How long a pairing code stays valid.
pub const PAIRING_CODE_TTL: Duration = Duration::from_secs(15 * 60);

/// A pairing code and when it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingState {
    pub code: PairingCode,
    pub created_at: Timestamp,
}

impl PairingState {
    #[must_use]
    pub fn new(code: PairingCode, created_at: Timestamp) -> Self {
        Self { code, created_at }
    }

    /// Whether the code is too old to be shown or polled.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age >= PAIRING_CODE_TTL,
            // created in the future: clock went backwards, keep the code
            Err(_) => false,
        }
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        let age = (now - self.created_at).to_std().unwrap_or_default();
        PAIRING_CODE_TTL.saturating_sub(age)
    }

    /// Interpret a status report for this code.
    #[must_use]
    pub fn outcome(&self, status: &PairStatus, now: Timestamp) -> PairingOutcome {
        match (status.paired, &status.device_id) {
            (true, Some(device_id)) => PairingOutcome::Paired(device_id.clone()),
            _ if self.is_expired(now) => PairingOutcome::Expired,
            _ => PairingOutcome::Pending,
        }
    }
}

/// Pairing status as reported by the server (poll response or push event).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStatus {
    #[serde(default)]
    pub paired: bool,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

/// Where a pairing attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    Pending,
    Paired(DeviceId),
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32, second: u32) -> Timestamp {
        chrono::Utc
            .with_ymd_and_hms(2026, 3, 1, 9, minute, second)
            .unwrap()
    }

    fn state() -> PairingState {
        PairingState::new(PairingCode::new("K7Q2"), at(0, 0))
    }

    #[test]
    fn should_expire_after_fifteen_minutes() {
        let state = state();
        assert!(!state.is_expired(at(14, 59)));
        assert!(state.is_expired(at(15, 0)));
        assert!(state.is_expired(at(40, 0)));
    }

    #[test]
    fn should_not_expire_when_clock_goes_backwards() {
        let state = PairingState::new(PairingCode::new("K7Q2"), at(10, 0));
        assert!(!state.is_expired(at(5, 0)));
    }

    #[test]
    fn should_report_remaining_time() {
        assert_eq!(state().remaining(at(10, 0)), Duration::from_secs(300));
        assert_eq!(state().remaining(at(20, 0)), Duration::ZERO);
    }

    #[test]
    fn should_resolve_paired_only_with_device_id() {
        let state = state();
        let paired = PairStatus {
            paired: true,
            device_id: Some(DeviceId::new("dev-1")),
        };
        assert_eq!(
            state.outcome(&paired, at(1, 0)),
            PairingOutcome::Paired(DeviceId::new("dev-1"))
        );

        let no_id = PairStatus {
            paired: true,
            device_id: None,
        };
        assert_eq!(state.outcome(&no_id, at(1, 0)), PairingOutcome::Pending);
        assert_eq!(state.outcome(&no_id, at(16, 0)), PairingOutcome::Expired);
    }

    #[test]
    fn should_deserialize_poll_response() {
        let status: PairStatus =
            serde_json::from_str(r#"{"paired":true,"deviceId":"dev-9"}"#).unwrap();
        assert!(status.paired);
        assert_eq!(status.device_id, Some(DeviceId::new("dev-9")));

        let pending: PairStatus = serde_json::from_str(r#"{"paired":false}"#).unwrap();
        assert_eq!(pending, PairStatus::default());
    }
}
