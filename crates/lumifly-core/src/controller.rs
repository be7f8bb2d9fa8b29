// ── Fleet controller ──
//
// Facade over a transport and a registry. Consumers (CLI, shell) call
// these operations; each one builds the matching prober, reader or
// actuator for the duration of the call.

use std::sync::Arc;
use std::time::Duration;

use lumifly_api::DeviceTransport;
use tokio_util::sync::CancellationToken;

use crate::actuator::{BatchActuator, RelayOnlyActuator};
use crate::error::CoreError;
use crate::model::{CommandTarget, WritePlan};
use crate::policy::{ConfirmationGate, ExecutionPolicy};
use crate::prober::AvailabilityProber;
use crate::reader::StateReader;
use crate::registry::FleetRegistry;
use crate::report::{BatchReport, ProbeReport, ReadReport};
use crate::session::SessionOptions;

/// Runtime knobs shared by every fleet operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetOptions {
    /// Bound on each connect/read/write/disconnect call.
    pub timeout: Duration,
    /// Devices in flight at once. 1 is the strictly sequential baseline.
    pub concurrency: usize,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self {
            timeout: SessionOptions::default().timeout,
            concurrency: 1,
        }
    }
}

impl FleetOptions {
    fn session(&self) -> SessionOptions {
        SessionOptions {
            timeout: self.timeout,
        }
    }
}

/// The main entry point for consumers.
#[derive(Debug)]
pub struct FleetController<T> {
    transport: Arc<T>,
    registry: FleetRegistry,
    options: FleetOptions,
}

impl<T: DeviceTransport> FleetController<T> {
    pub fn new(transport: Arc<T>, registry: FleetRegistry, mut options: FleetOptions) -> Self {
        options.concurrency = options.concurrency.max(1);
        Self {
            transport,
            registry,
            options,
        }
    }

    pub fn registry(&self) -> &FleetRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn options(&self) -> FleetOptions {
        self.options
    }

    /// Classify every device as reachable or unreachable.
    pub async fn probe(&self) -> ProbeReport {
        AvailabilityProber::new(self.transport.as_ref(), &self.registry, self.options.session())
            .with_concurrency(self.options.concurrency)
            .probe()
            .await
    }

    /// Read (dim, front, back) from every device.
    pub async fn read_all(&self) -> ReadReport {
        StateReader::new(self.transport.as_ref(), &self.registry, self.options.session())
            .with_concurrency(self.options.concurrency)
            .read_all()
            .await
    }

    /// Apply a validated target to every device.
    pub async fn apply<G: ConfirmationGate>(
        &self,
        target: CommandTarget,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> BatchReport {
        self.actuator()
            .apply(WritePlan::Full(target), policy, gate, cancel)
            .await
    }

    /// Validate raw input, then apply it. Invalid input fails before any
    /// device is contacted.
    pub async fn set_all<G: ConfirmationGate>(
        &self,
        dim: i64,
        relays: bool,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, CoreError> {
        let target = CommandTarget::new(dim, relays)?;
        Ok(self.apply(target, policy, gate, cancel).await)
    }

    /// Switch front and back relays only; dimmers keep their level.
    pub async fn apply_relays<G: ConfirmationGate>(
        &self,
        state: bool,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> BatchReport {
        RelayOnlyActuator::new(self.transport.as_ref(), &self.registry, self.options.session())
            .with_concurrency(self.options.concurrency)
            .apply(state, policy, gate, cancel)
            .await
    }

    fn actuator(&self) -> BatchActuator<'_, T> {
        BatchActuator::new(self.transport.as_ref(), &self.registry, self.options.session())
            .with_concurrency(self.options.concurrency)
    }
}
