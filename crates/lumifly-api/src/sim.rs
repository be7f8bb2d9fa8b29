// ── Simulated fleet ──
//
// In-process stand-in for a roster of lighting modules. Each endpoint
// exposes the three module fields (dimmer, front relay, back relay) under
// one namespace and enforces the same exact-type write rule a real server
// does. Faults and latency are injectable per endpoint so batch behavior
// can be exercised without a network.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use strum::{Display, EnumString};
use tokio::time::Instant;
use tracing::trace;

use crate::error::TransportError;
use crate::node::{Namespace, NodeAddress, NodeIdentifier};
use crate::transport::DeviceTransport;
use crate::value::{FieldType, FieldValue};

// ── Module layout ───────────────────────────────────────────────────

/// One of the three fields every lighting module exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModuleField {
    Dimmer,
    Front,
    Back,
}

/// Address layout and dimmer type of a simulated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub namespace: Namespace,
    pub dimmer: NodeIdentifier,
    pub front: NodeIdentifier,
    pub back: NodeIdentifier,
    pub dim_type: FieldType,
}

impl ModuleSpec {
    /// Standard layout: `i=2` dimmer (`UInt16`), `i=3` front, `i=4` back.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            dimmer: NodeIdentifier::Numeric(2),
            front: NodeIdentifier::Numeric(3),
            back: NodeIdentifier::Numeric(4),
            dim_type: FieldType::UInt16,
        }
    }

    pub fn with_ids(
        mut self,
        dimmer: NodeIdentifier,
        front: NodeIdentifier,
        back: NodeIdentifier,
    ) -> Self {
        self.dimmer = dimmer;
        self.front = front;
        self.back = back;
        self
    }

    /// Declare a different native type for the dimmer field.
    pub fn with_dim_type(mut self, dim_type: FieldType) -> Self {
        self.dim_type = dim_type;
        self
    }

    fn field_for(&self, node: &NodeAddress) -> Option<ModuleField> {
        if node.namespace != self.namespace {
            return None;
        }
        if node.identifier == self.dimmer {
            Some(ModuleField::Dimmer)
        } else if node.identifier == self.front {
            Some(ModuleField::Front)
        } else if node.identifier == self.back {
            Some(ModuleField::Back)
        } else {
            None
        }
    }
}

impl Default for ModuleSpec {
    fn default() -> Self {
        Self::new(Namespace::new(2))
    }
}

/// Point-in-time view of a simulated module's fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModuleState {
    pub dim: FieldValue,
    pub front: bool,
    pub back: bool,
}

// ── Fault injection ─────────────────────────────────────────────────

/// Failures and latency to inject on one endpoint.
///
/// Each populated reason makes the matching operation fail with
/// `TransportError::Injected`. `latency` delays every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub connect: Option<String>,
    pub read: Option<String>,
    pub type_query: Option<String>,
    pub write: Option<String>,
    /// Restrict `write` to one field. `None` fails every write.
    pub write_field: Option<ModuleField>,
    pub disconnect: Option<String>,
    pub latency: Option<Duration>,
}

impl FaultPlan {
    pub fn fail_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect = Some(reason.into());
        self
    }

    pub fn fail_read(mut self, reason: impl Into<String>) -> Self {
        self.read = Some(reason.into());
        self
    }

    pub fn fail_type_query(mut self, reason: impl Into<String>) -> Self {
        self.type_query = Some(reason.into());
        self
    }

    pub fn fail_write(mut self, reason: impl Into<String>) -> Self {
        self.write = Some(reason.into());
        self.write_field = None;
        self
    }

    pub fn fail_write_on(mut self, field: ModuleField, reason: impl Into<String>) -> Self {
        self.write = Some(reason.into());
        self.write_field = Some(field);
        self
    }

    pub fn fail_disconnect(mut self, reason: impl Into<String>) -> Self {
        self.disconnect = Some(reason.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn write_fault(&self, field: ModuleField) -> Option<&str> {
        match self.write_field {
            Some(only) if only != field => None,
            _ => self.write.as_deref(),
        }
    }
}

// ── Fleet ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Module {
    spec: ModuleSpec,
    dim: FieldValue,
    front: bool,
    back: bool,
    faults: FaultPlan,
    journal: Vec<ModuleField>,
    connects: Vec<Instant>,
}

impl Module {
    fn new(spec: ModuleSpec) -> Self {
        Self {
            dim: spec.dim_type.zero(),
            spec,
            front: false,
            back: false,
            faults: FaultPlan::default(),
            journal: Vec::new(),
            connects: Vec::new(),
        }
    }

    fn value(&self, field: ModuleField) -> FieldValue {
        match field {
            ModuleField::Dimmer => self.dim,
            ModuleField::Front => FieldValue::Boolean(self.front),
            ModuleField::Back => FieldValue::Boolean(self.back),
        }
    }

    fn node(&self, field: ModuleField) -> NodeAddress {
        let id = match field {
            ModuleField::Dimmer => &self.spec.dimmer,
            ModuleField::Front => &self.spec.front,
            ModuleField::Back => &self.spec.back,
        };
        NodeAddress::new(self.spec.namespace, id.clone())
    }

    fn declared_type(&self, field: ModuleField) -> FieldType {
        match field {
            ModuleField::Dimmer => self.spec.dim_type,
            ModuleField::Front | ModuleField::Back => FieldType::Boolean,
        }
    }

    /// Store `value` if its type matches the field's declared type.
    fn store(
        &mut self,
        field: ModuleField,
        node: &NodeAddress,
        value: FieldValue,
    ) -> Result<(), TransportError> {
        let expected = self.declared_type(field);
        let actual = value.field_type();
        if expected != actual {
            return Err(TransportError::TypeMismatch {
                node: node.to_string(),
                expected,
                actual,
            });
        }
        match (field, value) {
            (ModuleField::Dimmer, v) => self.dim = v,
            (ModuleField::Front, FieldValue::Boolean(b)) => self.front = b,
            (ModuleField::Back, FieldValue::Boolean(b)) => self.back = b,
            (ModuleField::Front | ModuleField::Back, _) => {
                return Err(TransportError::Other("unreachable relay value".into()));
            }
        }
        Ok(())
    }
}

/// Session handle issued by [`SimulatedFleet::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimHandle {
    pub session: u64,
    pub endpoint: String,
}

/// In-memory fleet of lighting modules implementing [`DeviceTransport`].
///
/// Endpoints are matched after stripping a trailing `/`. Connecting to an
/// endpoint that was never added fails as unreachable.
#[derive(Debug, Default)]
pub struct SimulatedFleet {
    modules: DashMap<String, Module>,
    sessions: DashMap<u64, String>,
    next_session: AtomicU64,
    connect_attempts: AtomicUsize,
    writes: AtomicUsize,
}

fn normalize(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_owned()
}

impl SimulatedFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module at `endpoint`, replacing any previous one.
    pub fn add_module(&self, endpoint: &str, spec: ModuleSpec) {
        self.modules.insert(normalize(endpoint), Module::new(spec));
    }

    /// Builder form of [`add_module`](Self::add_module).
    pub fn with_module(self, endpoint: &str, spec: ModuleSpec) -> Self {
        self.add_module(endpoint, spec);
        self
    }

    /// Overwrite a field directly, bypassing sessions and faults.
    pub fn preset(
        &self,
        endpoint: &str,
        field: ModuleField,
        value: FieldValue,
    ) -> Result<(), TransportError> {
        let key = normalize(endpoint);
        let mut module = self
            .modules
            .get_mut(&key)
            .ok_or_else(|| unknown_endpoint(&key))?;
        let node = module.node(field);
        module.store(field, &node, value)
    }

    pub fn inject(&self, endpoint: &str, faults: FaultPlan) {
        if let Some(mut module) = self.modules.get_mut(&normalize(endpoint)) {
            module.faults = faults;
        }
    }

    pub fn clear_faults(&self, endpoint: &str) {
        self.inject(endpoint, FaultPlan::default());
    }

    pub fn snapshot(&self, endpoint: &str) -> Option<ModuleState> {
        self.modules.get(&normalize(endpoint)).map(|m| ModuleState {
            dim: m.dim,
            front: m.front,
            back: m.back,
        })
    }

    /// Fields written on `endpoint`, in write order.
    pub fn write_journal(&self, endpoint: &str) -> Vec<ModuleField> {
        self.modules
            .get(&normalize(endpoint))
            .map(|m| m.journal.clone())
            .unwrap_or_default()
    }

    /// Instants at which `endpoint` accepted a connection attempt.
    pub fn connect_times(&self, endpoint: &str) -> Vec<Instant> {
        self.modules
            .get(&normalize(endpoint))
            .map(|m| m.connects.clone())
            .unwrap_or_default()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut out: Vec<String> = self.modules.iter().map(|m| m.key().clone()).collect();
        out.sort();
        out
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Copy of the fault plan for `endpoint`, taken without holding a map
    /// guard across an await point.
    fn faults(&self, endpoint: &str) -> Result<FaultPlan, TransportError> {
        self.modules
            .get(endpoint)
            .map(|m| m.faults.clone())
            .ok_or_else(|| unknown_endpoint(endpoint))
    }

    fn live_endpoint(&self, handle: &SimHandle) -> Result<String, TransportError> {
        self.sessions
            .get(&handle.session)
            .map(|e| e.value().clone())
            .ok_or(TransportError::SessionClosed)
    }

    async fn pause(latency: Option<Duration>) {
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn resolve(
        &self,
        endpoint: &str,
        node: &NodeAddress,
    ) -> Result<(ModuleField, FieldType), TransportError> {
        let module = self
            .modules
            .get(endpoint)
            .ok_or(TransportError::SessionClosed)?;
        let field = module
            .spec
            .field_for(node)
            .ok_or_else(|| TransportError::NodeNotFound {
                node: node.to_string(),
            })?;
        Ok((field, module.declared_type(field)))
    }
}

fn unknown_endpoint(endpoint: &str) -> TransportError {
    TransportError::Unreachable {
        endpoint: endpoint.to_owned(),
        reason: "no module listening".into(),
    }
}

fn injected(reason: &str) -> TransportError {
    TransportError::Injected(reason.to_owned())
}

impl DeviceTransport for SimulatedFleet {
    type Handle = SimHandle;

    async fn connect(&self, endpoint: &str) -> Result<SimHandle, TransportError> {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let key = normalize(endpoint);
        let faults = self.faults(&key)?;
        if let Some(mut module) = self.modules.get_mut(&key) {
            module.connects.push(Instant::now());
        }
        Self::pause(faults.latency).await;
        if let Some(reason) = faults.connect.as_deref() {
            return Err(injected(reason));
        }
        let session = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.insert(session, key.clone());
        trace!(endpoint = %key, session, "simulated session opened");
        Ok(SimHandle {
            session,
            endpoint: key,
        })
    }

    async fn read_value(
        &self,
        handle: &SimHandle,
        node: &NodeAddress,
    ) -> Result<FieldValue, TransportError> {
        let endpoint = self.live_endpoint(handle)?;
        let faults = self.faults(&endpoint)?;
        Self::pause(faults.latency).await;
        if let Some(reason) = faults.read.as_deref() {
            return Err(injected(reason));
        }
        let (field, _) = self.resolve(&endpoint, node)?;
        self.modules
            .get(&endpoint)
            .map(|m| Module::value(&m, field))
            .ok_or(TransportError::SessionClosed)
    }

    async fn native_type(
        &self,
        handle: &SimHandle,
        node: &NodeAddress,
    ) -> Result<FieldType, TransportError> {
        let endpoint = self.live_endpoint(handle)?;
        let faults = self.faults(&endpoint)?;
        Self::pause(faults.latency).await;
        if let Some(reason) = faults.type_query.as_deref() {
            return Err(injected(reason));
        }
        self.resolve(&endpoint, node).map(|(_, ty)| ty)
    }

    async fn write_value(
        &self,
        handle: &SimHandle,
        node: &NodeAddress,
        value: FieldValue,
    ) -> Result<(), TransportError> {
        let endpoint = self.live_endpoint(handle)?;
        let faults = self.faults(&endpoint)?;
        Self::pause(faults.latency).await;
        let (field, _) = self.resolve(&endpoint, node)?;
        if let Some(reason) = faults.write_fault(field) {
            return Err(injected(reason));
        }
        let mut module = self
            .modules
            .get_mut(&endpoint)
            .ok_or(TransportError::SessionClosed)?;
        module.store(field, node, value)?;
        module.journal.push(field);
        self.writes.fetch_add(1, Ordering::Relaxed);
        trace!(endpoint = %endpoint, %node, %value, "simulated write");
        Ok(())
    }

    async fn disconnect(&self, handle: SimHandle) -> Result<(), TransportError> {
        // The session is released even when a disconnect fault is injected.
        let removed = self.sessions.remove(&handle.session);
        let faults = self.faults(&handle.endpoint).unwrap_or_default();
        Self::pause(faults.latency).await;
        if let Some(reason) = faults.disconnect.as_deref() {
            return Err(injected(reason));
        }
        if removed.is_none() {
            return Err(TransportError::SessionClosed);
        }
        trace!(endpoint = %handle.endpoint, session = handle.session, "simulated session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EP: &str = "opc.tcp://10.0.0.5:4840";

    fn node(id: u32) -> NodeAddress {
        NodeAddress::new(Namespace::new(2), NodeIdentifier::Numeric(id))
    }

    fn fleet() -> SimulatedFleet {
        SimulatedFleet::new().with_module(EP, ModuleSpec::default())
    }

    #[tokio::test]
    async fn fresh_module_reads_zero_and_off() {
        let fleet = fleet();
        let h = fleet.connect(EP).await.expect("connect");
        assert_eq!(
            fleet.read_value(&h, &node(2)).await,
            Ok(FieldValue::UInt16(0))
        );
        assert_eq!(
            fleet.read_value(&h, &node(3)).await,
            Ok(FieldValue::Boolean(false))
        );
        fleet.disconnect(h).await.expect("disconnect");
        assert_eq!(fleet.open_sessions(), 0);
    }

    #[tokio::test]
    async fn writes_require_the_declared_type() {
        let fleet = fleet();
        let h = fleet.connect(EP).await.expect("connect");
        let err = fleet
            .write_value(&h, &node(2), FieldValue::Int32(5000))
            .await
            .expect_err("int32 into uint16");
        assert_eq!(
            err,
            TransportError::TypeMismatch {
                node: "ns=2;i=2".into(),
                expected: FieldType::UInt16,
                actual: FieldType::Int32,
            }
        );
        fleet
            .write_value(&h, &node(2), FieldValue::UInt16(5000))
            .await
            .expect("uint16 write");
        assert_eq!(fleet.snapshot(EP).map(|s| s.dim), Some(FieldValue::UInt16(5000)));
        assert_eq!(fleet.writes(), 1);
    }

    #[tokio::test]
    async fn trailing_slash_reaches_the_same_module() {
        let fleet = fleet();
        let h = fleet.connect(&format!("{EP}/")).await.expect("connect");
        assert_eq!(h.endpoint, EP);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_unreachable() {
        let fleet = fleet();
        let err = fleet
            .connect("opc.tcp://10.0.0.99:4840")
            .await
            .expect_err("nothing there");
        assert!(err.is_unreachable());
        assert_eq!(fleet.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn wrong_namespace_is_node_not_found() {
        let fleet = fleet();
        let h = fleet.connect(EP).await.expect("connect");
        let other = NodeAddress::new(Namespace::new(3), NodeIdentifier::Numeric(2));
        assert!(matches!(
            fleet.read_value(&h, &other).await,
            Err(TransportError::NodeNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn injected_faults_target_single_operations() {
        let fleet = fleet();
        fleet.inject(EP, FaultPlan::default().fail_write_on(ModuleField::Back, "relay stuck"));
        let h = fleet.connect(EP).await.expect("connect");
        fleet
            .write_value(&h, &node(3), FieldValue::Boolean(true))
            .await
            .expect("front ok");
        assert_eq!(
            fleet.write_value(&h, &node(4), FieldValue::Boolean(true)).await,
            Err(TransportError::Injected("relay stuck".into()))
        );
        assert_eq!(fleet.write_journal(EP), vec![ModuleField::Front]);

        fleet.clear_faults(EP);
        fleet
            .write_value(&h, &node(4), FieldValue::Boolean(true))
            .await
            .expect("back ok after clear");
    }

    #[tokio::test]
    async fn disconnect_fault_still_releases_session() {
        let fleet = fleet();
        fleet.inject(EP, FaultPlan::default().fail_disconnect("socket reset"));
        let h = fleet.connect(EP).await.expect("connect");
        assert!(fleet.disconnect(h.clone()).await.is_err());
        assert_eq!(fleet.open_sessions(), 0);
        assert_eq!(
            fleet.read_value(&h, &node(2)).await,
            Err(TransportError::SessionClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_operations() {
        let fleet = fleet();
        fleet.inject(EP, FaultPlan::default().with_latency(Duration::from_secs(2)));
        let start = Instant::now();
        let _h = fleet.connect(EP).await.expect("connect");
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn preset_bypasses_sessions() {
        let fleet = SimulatedFleet::new()
            .with_module(EP, ModuleSpec::default().with_dim_type(FieldType::Double));
        fleet
            .preset(EP, ModuleField::Dimmer, FieldValue::Double(7000.0))
            .expect("preset");
        fleet
            .preset(EP, ModuleField::Front, FieldValue::Boolean(true))
            .expect("preset");
        assert_eq!(
            fleet.snapshot(EP),
            Some(ModuleState {
                dim: FieldValue::Double(7000.0),
                front: true,
                back: false,
            })
        );
        assert!(fleet.write_journal(EP).is_empty());
    }
}
