use thiserror::Error;

use crate::value::{FieldType, ValueError};

/// Top-level error type for the `lumifly-api` crate.
///
/// Every transport implementation (real OPC-UA client, simulated fleet)
/// reports failures through this type. `lumifly-core` classifies them into
/// per-device connection/read/write outcomes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    // ── Connection ──────────────────────────────────────────────────
    /// The endpoint refused or never answered the connection attempt.
    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// The session handle is no longer usable.
    #[error("session closed")]
    SessionClosed,

    /// Operation exceeded its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Addressing ──────────────────────────────────────────────────
    /// The device does not expose the requested node.
    #[error("node {node} not found")]
    NodeNotFound { node: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The written value does not match the node's declared data type.
    #[error("type mismatch on {node}: device expects {expected}, got {actual}")]
    TypeMismatch {
        node: String,
        expected: FieldType,
        actual: FieldType,
    },

    /// The value could not be represented in the requested type.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The device returned a non-good status code.
    #[error("bad status on {node}: {status}")]
    Status { node: String, status: String },

    /// The device returned a value this crate cannot represent.
    #[error("unsupported value on {node}: {detail}")]
    Unsupported { node: String, detail: String },

    // ── Test harness ────────────────────────────────────────────────
    /// Failure injected by the simulated fleet.
    #[error("injected fault: {0}")]
    Injected(String),

    // ── Platform ────────────────────────────────────────────────────
    /// Anything the protocol stack reports that fits no other variant.
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the device itself could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this is a transient error worth retrying by a caller.
    ///
    /// The fleet core never retries on its own; the flag is informational.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::SessionClosed
        )
    }
}
