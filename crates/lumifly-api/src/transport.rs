// Device transport capability.
//
// The fleet core never talks to a protocol stack directly. It drives any
// implementation of `DeviceTransport`: the real OPC-UA client (feature
// `opcua`) or the in-process `SimulatedFleet` used by tests and `--simulate`.

use std::future::Future;

use crate::error::TransportError;
use crate::node::NodeAddress;
use crate::value::{FieldType, FieldValue};

/// Connect / read / write / disconnect against a single endpoint.
///
/// A `Handle` represents one open session. Callers own it between
/// `connect` and `disconnect`; implementations must tolerate `disconnect`
/// on a handle whose remote side is already gone.
pub trait DeviceTransport: Send + Sync {
    type Handle: Send + Sync;

    /// Open a session to `endpoint` (e.g. `opc.tcp://10.0.0.5:4840`).
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;

    /// Read the current value of `node`.
    fn read_value(
        &self,
        handle: &Self::Handle,
        node: &NodeAddress,
    ) -> impl Future<Output = Result<FieldValue, TransportError>> + Send;

    /// Query the data type `node` declares for writes.
    fn native_type(
        &self,
        handle: &Self::Handle,
        node: &NodeAddress,
    ) -> impl Future<Output = Result<FieldType, TransportError>> + Send;

    /// Write `value` to `node`. The value's type must match the node's
    /// declared type exactly.
    fn write_value(
        &self,
        handle: &Self::Handle,
        node: &NodeAddress,
        value: FieldValue,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the session.
    fn disconnect(
        &self,
        handle: Self::Handle,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
