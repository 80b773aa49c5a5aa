//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SignageError`] via `#[from]`. Variants map one-to-one onto the
//! recovery policy the orchestrator applies (retry, discard, re-pair,
//! skip, degrade).

/// Top-level error for the signage orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SignageError {
    /// A builder or configuration invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A payload received from the server could not be used.
    #[error("invalid payload")]
    InvalidPayload(#[from] PayloadError),

    /// A transient network failure; retried by the poller / live channel.
    #[error("transient network error")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server no longer knows this device (`404` on resolve).
    #[error("device {device_id} is not bound")]
    DeviceUnbound {
        /// The identity that failed to resolve.
        device_id: String,
    },

    /// A slide could not be rendered or its media failed to play.
    #[error("media playback failed: {0}")]
    MediaPlayback(String),

    /// Persisted local state is unavailable.
    #[error("local storage unavailable")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SignageError {
    /// Wrap any error as a transient network failure.
    pub fn network(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Network(Box::new(err))
    }

    /// Whether the failure is worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Invariant violations detected by builders and validators.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required name was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A time-of-day string was not `HH:MM`.
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    /// A stable key could not be parsed.
    #[error("invalid content reference {0:?}")]
    InvalidReference(String),

    /// A range rule ends before it starts.
    #[error("range rule ends before it starts")]
    InvertedRange,

    /// A numeric option was outside its allowed range.
    #[error("{field} must be {constraint}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Human-readable constraint.
        constraint: &'static str,
    },
}

/// Reasons a server payload is rejected.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The body was not valid JSON for the expected shape.
    #[error("malformed JSON")]
    Json(#[from] serde_json::Error),

    /// A schedule row does not have one cell per zone.
    #[error("row {row} has {actual} entries, expected {expected}")]
    RowWidth {
        /// Index of the offending row.
        row: usize,
        /// Number of zones.
        expected: usize,
        /// Number of cells in the row.
        actual: usize,
    },

    /// A schedule row day offset is outside `0..=7`.
    #[error("row {row} has day offset {offset}, expected 0..=7")]
    DayOffset {
        /// Index of the offending row.
        row: usize,
        /// The offset received.
        offset: u8,
    },

    /// A field value violated a domain rule.
    #[error("invalid field")]
    Field(#[from] ValidationError),

    /// A required field is absent.
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    /// A resolve answered with success but described an unknown device.
    /// Only a `404` unbinds a terminal.
    #[error("resolve succeeded with a not-found body")]
    NotFoundBody,

    /// A push event name is not one this client understands.
    #[error("unknown push event {0:?}")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_only_network_errors_as_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        assert!(SignageError::network(io).is_transient());
        assert!(!SignageError::MediaPlayback("boom".to_string()).is_transient());
        assert!(
            !SignageError::DeviceUnbound {
                device_id: "d1".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn should_convert_payload_error_into_invalid_payload() {
        let err: SignageError = PayloadError::RowWidth {
            row: 2,
            expected: 3,
            actual: 1,
        }
        .into();
        assert!(matches!(err, SignageError::InvalidPayload(_)));
    }

    #[test]
    fn should_display_row_width_error() {
        let err = PayloadError::RowWidth {
            row: 0,
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "row 0 has 1 entries, expected 2");
    }

    #[test]
    fn should_display_device_unbound_with_id() {
        let err = SignageError::DeviceUnbound {
            device_id: "kiosk-7".to_string(),
        };
        assert_eq!(err.to_string(), "device kiosk-7 is not bound");
    }
}
