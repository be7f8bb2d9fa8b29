// ── Core error types ──
//
// Two tiers. `CoreError` aborts a whole invocation and is only ever raised
// before any device is contacted. `DeviceError` is scoped to one device and
// lives inside that device's outcome record; it never escapes a batch.

use serde::Serialize;
use thiserror::Error;

/// Invocation-level failure: bad caller input or a malformed roster.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InputValidation { field: String, reason: String },

    // ── Roster errors ────────────────────────────────────────────────
    #[error("Invalid device {endpoint} ({field}): {reason}")]
    InvalidDescriptor {
        endpoint: String,
        field: String,
        reason: String,
    },

    #[error("Fleet registry is empty")]
    EmptyRegistry,

    #[error("Duplicate device {endpoint} ({namespace}) at positions {first} and {second}")]
    DuplicateDevice {
        endpoint: String,
        namespace: String,
        first: usize,
        second: usize,
    },
}

impl CoreError {
    pub(crate) fn input(field: &str, reason: impl Into<String>) -> Self {
        Self::InputValidation {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for roster/configuration problems.
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::InputValidation { .. })
    }
}

/// Per-device failure, recorded in the device's outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceError {
    /// The device could not be reached or the session could not be opened.
    #[error("connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// A field read failed after a successful connect. The device state is
    /// unknown, not down.
    #[error("read of {node} failed: {reason}")]
    Read { node: String, reason: String },

    /// A field write failed after a successful connect.
    #[error("write of {node} failed: {reason}")]
    Write { node: String, reason: String },
}

impl DeviceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Connection { reason, .. }
            | Self::Read { reason, .. }
            | Self::Write { reason, .. } => reason,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_serialize_with_kind_tag() {
        let err = DeviceError::Write {
            node: "ns=2;i=2".into(),
            reason: "value 5000 does not fit in Byte".into(),
        };
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["kind"], "write");
        assert_eq!(json["node"], "ns=2;i=2");
        assert_eq!(err.kind(), "write");
        assert_eq!(err.reason(), "value 5000 does not fit in Byte");
    }

    #[test]
    fn only_input_validation_is_not_config() {
        assert!(!CoreError::input("dim", "out of range").is_config());
        assert!(CoreError::EmptyRegistry.is_config());
    }
}
