// ── Availability prober ──

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use lumifly_api::DeviceTransport;
use tracing::{debug, info, warn};

use crate::model::{DeviceDescriptor, ProbeOutcome};
use crate::registry::FleetRegistry;
use crate::report::ProbeReport;
use crate::session::{SessionOptions, with_session};

/// Opens and immediately closes one session per device.
///
/// Reachability is binary: a session that opens is reachable. Nothing is
/// read or written.
pub struct AvailabilityProber<'a, T> {
    transport: &'a T,
    registry: &'a FleetRegistry,
    options: SessionOptions,
    concurrency: usize,
}

impl<'a, T: DeviceTransport> AvailabilityProber<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FleetRegistry, options: SessionOptions) -> Self {
        Self {
            transport,
            registry,
            options,
            concurrency: 1,
        }
    }

    /// Probe up to `concurrency` devices at once. Report order is unchanged.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn probe(&self) -> ProbeReport {
        let started_at = Utc::now();
        let outcomes: Vec<ProbeOutcome> = stream::iter(self.registry.iter().enumerate())
            .map(|(index, device)| self.probe_one(index, device))
            .buffered(self.concurrency)
            .collect()
            .await;
        let report = ProbeReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            reachable = report.reachable().len(),
            total = report.outcomes.len(),
            "probe finished"
        );
        report
    }

    async fn probe_one(&self, index: usize, device: &DeviceDescriptor) -> ProbeOutcome {
        let result = with_session(self.transport, device, &self.options, async |_| Ok(())).await;
        match &result {
            Ok(()) => debug!(endpoint = %device.endpoint, "reachable"),
            Err(err) => warn!(endpoint = %device.endpoint, error = %err, "unreachable"),
        }
        ProbeOutcome::new(index, device, result)
    }
}
