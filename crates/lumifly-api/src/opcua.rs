// ── OPC-UA client transport ──
//
// Anonymous, unsecured (`SecurityPolicy::None`) sessions against real
// lighting modules. The opcua client API is synchronous, so every call runs
// on the blocking pool.
//
// The caller's deadline only drops the join handle: a request the client has
// already sent keeps running on the blocking pool and may still reach the
// module after the caller reported a timeout. Calls that have not started by
// the deadline are never sent.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use opcua::client::prelude::{
    AttributeId, AttributeService, ByteString, ClientBuilder, DataValue, Guid, IdentityToken,
    Identifier, MessageSecurityMode, NodeId, QualifiedName, ReadValueId, SecurityPolicy, Session,
    StatusCode, TimestampsToReturn, UAString, UserTokenPolicy, Variant, WriteValue,
};
use opcua::sync::RwLock;
use tracing::debug;

use crate::error::TransportError;
use crate::node::{NodeAddress, NodeIdentifier};
use crate::transport::DeviceTransport;
use crate::value::{FieldType, FieldValue};

/// Open session with one module.
#[derive(Clone)]
pub struct OpcUaHandle {
    endpoint: String,
    session: Arc<RwLock<Session>>,
}

impl std::fmt::Debug for OpcUaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaHandle")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// [`DeviceTransport`] backed by the `opcua` client.
#[derive(Debug, Clone)]
pub struct OpcUaTransport {
    application_name: String,
    call_timeout: Duration,
}

impl Default for OpcUaTransport {
    fn default() -> Self {
        Self {
            application_name: "lumifly".into(),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl OpcUaTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls still queued for the blocking pool after `timeout` are dropped
    /// unsent. Match this to the fleet's per-operation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.call_timeout
    }

    fn open(&self, endpoint: &str) -> Result<Arc<RwLock<Session>>, TransportError> {
        let unreachable = |reason: String| TransportError::Unreachable {
            endpoint: endpoint.to_owned(),
            reason,
        };
        let mut client = ClientBuilder::new()
            .application_name(self.application_name.as_str())
            .application_uri(format!("urn:{}", self.application_name))
            .trust_server_certs(true)
            .session_retry_limit(0)
            .client()
            .ok_or_else(|| unreachable("invalid client configuration".into()))?;
        client
            .connect_to_endpoint(
                (
                    endpoint,
                    SecurityPolicy::None.to_str(),
                    MessageSecurityMode::None,
                    UserTokenPolicy::anonymous(),
                ),
                IdentityToken::Anonymous,
            )
            .map_err(|status| unreachable(status.to_string()))
    }
}

fn node_id(node: &NodeAddress) -> Result<NodeId, TransportError> {
    let ns = node.namespace.index();
    let unsupported = |detail: &str| TransportError::Unsupported {
        node: node.to_string(),
        detail: detail.to_owned(),
    };
    Ok(match &node.identifier {
        NodeIdentifier::Numeric(n) => NodeId::new(ns, *n),
        NodeIdentifier::String(s) => NodeId::new(ns, UAString::from(s.as_str())),
        NodeIdentifier::Guid(g) => NodeId::new(
            ns,
            Guid::from_str(g).map_err(|()| unsupported("malformed guid"))?,
        ),
        NodeIdentifier::Opaque(b) => NodeId::new(
            ns,
            ByteString::from_base64(b).ok_or_else(|| unsupported("malformed base64"))?,
        ),
    })
}

fn check_status(node: &NodeAddress, status: StatusCode) -> Result<(), TransportError> {
    if status.is_good() {
        Ok(())
    } else {
        Err(TransportError::Status {
            node: node.to_string(),
            status: status.to_string(),
        })
    }
}

fn from_variant(node: &NodeAddress, variant: Variant) -> Result<FieldValue, TransportError> {
    Ok(match variant {
        Variant::Boolean(v) => FieldValue::Boolean(v),
        Variant::SByte(v) => FieldValue::SByte(v),
        Variant::Byte(v) => FieldValue::Byte(v),
        Variant::Int16(v) => FieldValue::Int16(v),
        Variant::UInt16(v) => FieldValue::UInt16(v),
        Variant::Int32(v) => FieldValue::Int32(v),
        Variant::UInt32(v) => FieldValue::UInt32(v),
        Variant::Int64(v) => FieldValue::Int64(v),
        Variant::UInt64(v) => FieldValue::UInt64(v),
        Variant::Float(v) => FieldValue::Float(v),
        Variant::Double(v) => FieldValue::Double(v),
        other => {
            return Err(TransportError::Unsupported {
                node: node.to_string(),
                detail: format!("{:?}", other.type_id()),
            });
        }
    })
}

fn to_variant(value: FieldValue) -> Variant {
    match value {
        FieldValue::Boolean(v) => Variant::Boolean(v),
        FieldValue::SByte(v) => Variant::SByte(v),
        FieldValue::Byte(v) => Variant::Byte(v),
        FieldValue::Int16(v) => Variant::Int16(v),
        FieldValue::UInt16(v) => Variant::UInt16(v),
        FieldValue::Int32(v) => Variant::Int32(v),
        FieldValue::UInt32(v) => Variant::UInt32(v),
        FieldValue::Int64(v) => Variant::Int64(v),
        FieldValue::UInt64(v) => Variant::UInt64(v),
        FieldValue::Float(v) => Variant::Float(v),
        FieldValue::Double(v) => Variant::Double(v),
    }
}

/// Map a namespace-0 built-in data type id onto a field type.
fn field_type_of(node: &NodeAddress, data_type: &NodeId) -> Result<FieldType, TransportError> {
    let builtin = match (&data_type.namespace, &data_type.identifier) {
        (0, Identifier::Numeric(n)) => *n,
        _ => 0,
    };
    Ok(match builtin {
        1 => FieldType::Boolean,
        2 => FieldType::SByte,
        3 => FieldType::Byte,
        4 => FieldType::Int16,
        5 => FieldType::UInt16,
        6 => FieldType::Int32,
        7 => FieldType::UInt32,
        8 => FieldType::Int64,
        9 => FieldType::UInt64,
        10 => FieldType::Float,
        11 => FieldType::Double,
        _ => {
            return Err(TransportError::Unsupported {
                node: node.to_string(),
                detail: format!("data type {data_type}"),
            });
        }
    })
}

/// Read one attribute of `node`, returning the raw variant.
fn read_attribute(
    session: &RwLock<Session>,
    node: &NodeAddress,
    attribute: AttributeId,
) -> Result<Variant, TransportError> {
    let request = ReadValueId {
        node_id: node_id(node)?,
        attribute_id: attribute as u32,
        index_range: UAString::null(),
        data_encoding: QualifiedName::null(),
    };
    let results = session
        .read()
        .read(&[request], TimestampsToReturn::Neither, 0.0)
        .map_err(|status| TransportError::Status {
            node: node.to_string(),
            status: status.to_string(),
        })?;
    let DataValue { value, status, .. } = results
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Other(format!("empty read response for {node}")))?;
    check_status(node, status.unwrap_or(StatusCode::Good))?;
    value.ok_or_else(|| TransportError::Unsupported {
        node: node.to_string(),
        detail: "no value".into(),
    })
}

/// Run `op` on the blocking pool unless it only gets a thread after
/// `deadline`.
async fn blocking<T, F>(deadline: Instant, op: F) -> Result<T, TransportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    let queued = Instant::now();
    tokio::task::spawn_blocking(move || {
        let now = Instant::now();
        if now >= deadline {
            return Err(TransportError::Timeout {
                timeout_ms: u64::try_from(now.duration_since(queued).as_millis())
                    .unwrap_or(u64::MAX),
            });
        }
        op()
    })
    .await
    .map_err(|e| TransportError::Other(format!("blocking task failed: {e}")))?
}

impl DeviceTransport for OpcUaTransport {
    type Handle = OpcUaHandle;

    async fn connect(&self, endpoint: &str) -> Result<OpcUaHandle, TransportError> {
        let this = self.clone();
        let endpoint = endpoint.to_owned();
        blocking(self.deadline(), move || {
            let session = this.open(&endpoint)?;
            debug!(endpoint = %endpoint, "opc-ua session activated");
            Ok(OpcUaHandle { endpoint, session })
        })
        .await
    }

    async fn read_value(
        &self,
        handle: &OpcUaHandle,
        node: &NodeAddress,
    ) -> Result<FieldValue, TransportError> {
        let session = Arc::clone(&handle.session);
        let node = node.clone();
        blocking(self.deadline(), move || {
            let variant = read_attribute(&session, &node, AttributeId::Value)?;
            from_variant(&node, variant)
        })
        .await
    }

    async fn native_type(
        &self,
        handle: &OpcUaHandle,
        node: &NodeAddress,
    ) -> Result<FieldType, TransportError> {
        let session = Arc::clone(&handle.session);
        let node = node.clone();
        blocking(self.deadline(), move || {
            match read_attribute(&session, &node, AttributeId::DataType)? {
                Variant::NodeId(id) => field_type_of(&node, &id),
                other => Err(TransportError::Unsupported {
                    node: node.to_string(),
                    detail: format!("data type attribute holds {:?}", other.type_id()),
                }),
            }
        })
        .await
    }

    async fn write_value(
        &self,
        handle: &OpcUaHandle,
        node: &NodeAddress,
        value: FieldValue,
    ) -> Result<(), TransportError> {
        let session = Arc::clone(&handle.session);
        let node = node.clone();
        blocking(self.deadline(), move || {
            let request = WriteValue {
                node_id: node_id(&node)?,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::value_only(to_variant(value)),
            };
            let results = session
                .read()
                .write(&[request])
                .map_err(|status| TransportError::Status {
                    node: node.to_string(),
                    status: status.to_string(),
                })?;
            let status = results
                .into_iter()
                .next()
                .ok_or_else(|| TransportError::Other(format!("empty write response for {node}")))?;
            check_status(&node, status)
        })
        .await
    }

    async fn disconnect(&self, handle: OpcUaHandle) -> Result<(), TransportError> {
        blocking(self.deadline(), move || {
            handle.session.read().disconnect();
            debug!(endpoint = %handle.endpoint, "opc-ua session closed");
            Ok(())
        })
        .await
    }
}
