// ── Device session ──
//
// One short-lived connection to one device. `with_session` owns the
// connect/disconnect pair so disconnect runs on every exit path of the
// body, success or failure. Every transport call is bounded by the
// configured timeout; a timeout is an ordinary per-device failure.

use std::future::Future;
use std::time::Duration;

use lumifly_api::{DeviceTransport, FieldValue, NodeAddress, TransportError};
use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::model::{DeviceDescriptor, DimLevel, FieldTriple, Readback, WritePlan};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-operation bounds for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A live session. Only reachable inside [`with_session`].
pub struct DeviceSession<'a, T: DeviceTransport> {
    transport: &'a T,
    descriptor: &'a DeviceDescriptor,
    handle: T::Handle,
    timeout: Duration,
}

/// Connect to `descriptor`, run `body`, then disconnect.
///
/// Disconnect is attempted whether `body` succeeds or fails. A disconnect
/// failure is logged and never replaces the body's result.
pub async fn with_session<'a, T, R, F>(
    transport: &'a T,
    descriptor: &'a DeviceDescriptor,
    options: &SessionOptions,
    body: F,
) -> Result<R, DeviceError>
where
    T: DeviceTransport,
    F: AsyncFnOnce(&DeviceSession<'a, T>) -> Result<R, DeviceError>,
{
    let handle = bounded(options.timeout, transport.connect(&descriptor.endpoint))
        .await
        .map_err(|e| DeviceError::Connection {
            endpoint: descriptor.endpoint.clone(),
            reason: e.to_string(),
        })?;
    debug!(endpoint = %descriptor.endpoint, "session opened");

    let session = DeviceSession {
        transport,
        descriptor,
        handle,
        timeout: options.timeout,
    };
    let result = body(&session).await;
    session.close().await;
    result
}

async fn bounded<R>(
    timeout: Duration,
    op: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, TransportError> {
    tokio::time::timeout(timeout, op)
        .await
        .unwrap_or_else(|_| {
            Err(TransportError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        })
}

impl<T: DeviceTransport> DeviceSession<'_, T> {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        self.descriptor
    }

    /// Read dimmer, front relay and back relay, in that order.
    pub async fn read_triple(&self) -> Result<FieldTriple, DeviceError> {
        let dim = self.read(&self.descriptor.dimmer()).await?;
        if !dim.is_numeric() {
            return Err(DeviceError::Read {
                node: self.descriptor.dimmer().to_string(),
                reason: format!("expected a numeric dimmer, got {}", dim.field_type()),
            });
        }
        let front = self.read_relay(&self.descriptor.front()).await?;
        let back = self.read_relay(&self.descriptor.back()).await?;
        Ok(FieldTriple { dim, front, back })
    }

    /// Apply `plan`: dimmer (when present), then front, then back.
    pub async fn write_plan(&self, plan: &WritePlan) -> Result<(), DeviceError> {
        if let Some(level) = plan.dim() {
            self.write_dimmer(level).await?;
        }
        let state = FieldValue::Boolean(plan.relay_state());
        self.write(&self.descriptor.front(), state).await?;
        self.write(&self.descriptor.back(), state).await
    }

    /// Read back after writing. A failed read does not undo the writes.
    pub async fn read_back(&self) -> Readback {
        match self.read_triple().await {
            Ok(fields) => Readback::Confirmed(fields),
            Err(err) => {
                warn!(endpoint = %self.descriptor.endpoint, error = %err, "read-back failed");
                Readback::Unknown {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Write the dimmer in the node's native type. The type query and the
    /// conversion both count as part of the write.
    async fn write_dimmer(&self, level: DimLevel) -> Result<(), DeviceError> {
        let node = self.descriptor.dimmer();
        let native = bounded(self.timeout, self.transport.native_type(&self.handle, &node))
            .await
            .map_err(|e| write_error(&node, &e))?;
        let value = FieldValue::from_integer(i64::from(level.get()), native)
            .map_err(|e| write_error(&node, &e.into()))?;
        self.write(&node, value).await
    }

    async fn write(&self, node: &NodeAddress, value: FieldValue) -> Result<(), DeviceError> {
        debug!(endpoint = %self.descriptor.endpoint, %node, %value, "write");
        bounded(self.timeout, self.transport.write_value(&self.handle, node, value))
            .await
            .map_err(|e| write_error(node, &e))
    }

    async fn read(&self, node: &NodeAddress) -> Result<FieldValue, DeviceError> {
        bounded(self.timeout, self.transport.read_value(&self.handle, node))
            .await
            .map_err(|e| DeviceError::Read {
                node: node.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read_relay(&self, node: &NodeAddress) -> Result<bool, DeviceError> {
        let value = self.read(node).await?;
        value.as_bool().ok_or_else(|| DeviceError::Read {
            node: node.to_string(),
            reason: format!("expected Boolean, got {}", value.field_type()),
        })
    }

    async fn close(self) {
        let endpoint = self.descriptor.endpoint.clone();
        match bounded(self.timeout, self.transport.disconnect(self.handle)).await {
            Ok(()) => debug!(endpoint = %endpoint, "session closed"),
            Err(err) => warn!(endpoint = %endpoint, error = %err, "disconnect failed"),
        }
    }
}

fn write_error(node: &NodeAddress, err: &TransportError) -> DeviceError {
    DeviceError::Write {
        node: node.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumifly_api::{FaultPlan, FieldType, ModuleField, ModuleSpec, SimulatedFleet};
    use pretty_assertions::assert_eq;

    const EP: &str = "opc.tcp://10.0.0.5:4840";

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor::parse(EP, "ns=2", ["i=2", "i=3", "i=4"]).expect("valid")
    }

    fn plan(dim: i64, relays: bool) -> WritePlan {
        WritePlan::Full(crate::model::CommandTarget::new(dim, relays).expect("valid"))
    }

    #[tokio::test]
    async fn writes_dim_front_back_in_order() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        let d = descriptor();
        let readback = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(5000, true)).await?;
            Ok(s.read_back().await)
        })
        .await
        .expect("applied");

        assert_eq!(
            fleet.write_journal(EP),
            vec![ModuleField::Dimmer, ModuleField::Front, ModuleField::Back]
        );
        assert_eq!(
            readback,
            Readback::Confirmed(FieldTriple {
                dim: FieldValue::UInt16(5000),
                front: true,
                back: true,
            })
        );
        assert_eq!(fleet.open_sessions(), 0);
    }

    #[tokio::test]
    async fn dimmer_follows_native_type() {
        let fleet = SimulatedFleet::new()
            .with_module(EP, ModuleSpec::default().with_dim_type(FieldType::Double));
        let d = descriptor();
        with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(2500, false)).await
        })
        .await
        .expect("applied");
        assert_eq!(fleet.snapshot(EP).map(|m| m.dim), Some(FieldValue::Double(2500.0)));
    }

    #[tokio::test]
    async fn unrepresentable_dim_is_a_write_error() {
        let fleet = SimulatedFleet::new()
            .with_module(EP, ModuleSpec::default().with_dim_type(FieldType::Byte));
        let d = descriptor();
        let err = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(5000, true)).await
        })
        .await
        .expect_err("5000 does not fit a byte");
        assert!(matches!(err, DeviceError::Write { ref node, .. } if node == "ns=2;i=2"));
        assert_eq!(fleet.writes(), 0);
        assert_eq!(fleet.open_sessions(), 0);
    }

    #[tokio::test]
    async fn type_query_failure_is_a_write_error() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        fleet.inject(EP, FaultPlan::default().fail_type_query("browse denied"));
        let d = descriptor();
        let err = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(10, true)).await
        })
        .await
        .expect_err("type query fails");
        assert_eq!(err.kind(), "write");
    }

    #[tokio::test]
    async fn failed_write_still_disconnects() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        fleet.inject(EP, FaultPlan::default().fail_write_on(ModuleField::Front, "relay stuck"));
        let d = descriptor();
        let err = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(100, true)).await
        })
        .await
        .expect_err("front write fails");
        assert!(matches!(err, DeviceError::Write { ref node, .. } if node == "ns=2;i=3"));
        assert_eq!(fleet.write_journal(EP), vec![ModuleField::Dimmer]);
        assert_eq!(fleet.open_sessions(), 0);
    }

    #[tokio::test]
    async fn disconnect_failure_does_not_mask_result() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        fleet.inject(EP, FaultPlan::default().fail_disconnect("socket reset"));
        let d = descriptor();
        let fields = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.read_triple().await
        })
        .await
        .expect("read succeeds despite disconnect fault");
        assert_eq!(fields.dim, FieldValue::UInt16(0));
    }

    #[tokio::test]
    async fn failed_read_back_is_unknown_not_error() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        fleet.inject(EP, FaultPlan::default().fail_read("read denied"));
        let d = descriptor();
        let readback = with_session(&fleet, &d, &SessionOptions::default(), async |s| {
            s.write_plan(&plan(42, true)).await?;
            Ok(s.read_back().await)
        })
        .await
        .expect("writes succeeded");
        assert!(matches!(readback, Readback::Unknown { .. }));
        assert_eq!(fleet.snapshot(EP).map(|m| m.front), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connect_times_out() {
        let fleet = SimulatedFleet::new().with_module(EP, ModuleSpec::default());
        fleet.inject(EP, FaultPlan::default().with_latency(Duration::from_secs(30)));
        let d = descriptor();
        let options = SessionOptions {
            timeout: Duration::from_secs(1),
        };
        let err = with_session(&fleet, &d, &options, async |_| Ok(()))
            .await
            .expect_err("times out");
        assert!(err.is_connection());
        assert!(err.reason().contains("1000ms"));
    }

    #[tokio::test]
    async fn unknown_endpoint_is_a_connection_error() {
        let fleet = SimulatedFleet::new();
        let d = descriptor();
        let err = with_session(&fleet, &d, &SessionOptions::default(), async |_| Ok(()))
            .await
            .expect_err("no module");
        assert_eq!(
            err,
            DeviceError::Connection {
                endpoint: EP.into(),
                reason: format!("endpoint {EP} unreachable: no module listening"),
            }
        );
    }
}
