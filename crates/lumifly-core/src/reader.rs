// ── State reader ──

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use lumifly_api::DeviceTransport;
use tracing::{info, warn};

use crate::model::{DeviceDescriptor, ReadOutcome};
use crate::registry::FleetRegistry;
use crate::report::ReadReport;
use crate::session::{SessionOptions, with_session};

/// Reads the (dim, front, back) triple from every device, index-aligned
/// with the registry. A failing device yields a failure record and the
/// walk continues.
pub struct StateReader<'a, T> {
    transport: &'a T,
    registry: &'a FleetRegistry,
    options: SessionOptions,
    concurrency: usize,
}

impl<'a, T: DeviceTransport> StateReader<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FleetRegistry, options: SessionOptions) -> Self {
        Self {
            transport,
            registry,
            options,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn read_all(&self) -> ReadReport {
        let started_at = Utc::now();
        let outcomes: Vec<ReadOutcome> = stream::iter(self.registry.iter().enumerate())
            .map(|(index, device)| self.read_one(index, device))
            .buffered(self.concurrency)
            .collect()
            .await;
        let report = ReadReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "read finished"
        );
        report
    }

    async fn read_one(&self, index: usize, device: &DeviceDescriptor) -> ReadOutcome {
        let result = with_session(self.transport, device, &self.options, async |s| {
            s.read_triple().await
        })
        .await;
        if let Err(err) = &result {
            warn!(endpoint = %device.endpoint, error = %err, "read failed");
        }
        ReadOutcome::new(index, device, result)
    }
}
