// ── Device descriptor ──

use std::fmt;

use lumifly_api::{Namespace, NodeAddress, NodeIdentifier};
use serde::Serialize;

use crate::error::CoreError;

/// Slot positions inside [`DeviceDescriptor::node_ids`].
pub const DIMMER_SLOT: usize = 0;
pub const FRONT_SLOT: usize = 1;
pub const BACK_SLOT: usize = 2;

/// Identifies one controllable lighting module.
///
/// `node_ids` is positional: slot 0 is the dimmer output, slot 1 the front
/// relay, slot 2 the back relay. Descriptors are built once from the roster
/// and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub endpoint: String,
    pub namespace: Namespace,
    pub node_ids: [NodeIdentifier; 3],
}

impl DeviceDescriptor {
    pub fn new(
        endpoint: impl Into<String>,
        namespace: Namespace,
        node_ids: [NodeIdentifier; 3],
    ) -> Self {
        Self {
            name: None,
            endpoint: endpoint.into(),
            namespace,
            node_ids,
        }
    }

    /// Build a descriptor from roster text, validating every part.
    pub fn parse(endpoint: &str, namespace: &str, node_ids: [&str; 3]) -> Result<Self, CoreError> {
        let invalid = |field: &str, reason: String| CoreError::InvalidDescriptor {
            endpoint: endpoint.to_owned(),
            field: field.to_owned(),
            reason,
        };
        let endpoint_trimmed = endpoint.trim();
        if endpoint_trimmed.is_empty() {
            return Err(invalid("endpoint", "must not be empty".into()));
        }
        let namespace =
            Namespace::parse(namespace).map_err(|e| invalid("namespace", e.to_string()))?;
        let [dimmer, front, back] = node_ids;
        let id = |field: &str, raw: &str| {
            NodeIdentifier::parse(raw).map_err(|e| invalid(field, e.to_string()))
        };
        Ok(Self::new(
            endpoint_trimmed,
            namespace,
            [id("dimmer_id", dimmer)?, id("front_id", front)?, id("back_id", back)?],
        ))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if configured, otherwise the endpoint.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.endpoint)
    }

    pub fn dimmer(&self) -> NodeAddress {
        self.address(DIMMER_SLOT)
    }

    pub fn front(&self) -> NodeAddress {
        self.address(FRONT_SLOT)
    }

    pub fn back(&self) -> NodeAddress {
        self.address(BACK_SLOT)
    }

    fn address(&self, slot: usize) -> NodeAddress {
        let [dimmer, front, back] = &self.node_ids;
        let id = match slot {
            DIMMER_SLOT => dimmer,
            FRONT_SLOT => front,
            _ => back,
        };
        NodeAddress::new(self.namespace, id.clone())
    }

    /// Endpoint with any trailing `/` removed, for identity comparisons.
    pub(crate) fn endpoint_key(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.namespace)
    }
}
