// ── Batch actuator ──
//
// Applies one write plan to every device in registry order. Each device
// runs connect → write (dim → front → back) → read back → disconnect in
// its own session, and a device failure only ever produces that device's
// outcome record.
//
// Sequential mode (concurrency 1, and always for ManualStepped) walks the
// registry one device at a time. Pooled mode runs up to `concurrency`
// devices through an ordered buffered stream; a Delayed policy then paces
// device starts on a global schedule instead of sleeping between pairs.
//
// Cancellation is checked between devices and during delays. Devices that
// never started are reported as skipped so outcomes stay index-aligned.

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use lumifly_api::DeviceTransport;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::model::{DeviceDescriptor, DeviceOutcome, OutcomeStatus, SkipReason, WritePlan};
use crate::policy::{Confirmation, ConfirmationGate, ExecutionPolicy};
use crate::registry::FleetRegistry;
use crate::report::BatchReport;
use crate::session::{SessionOptions, with_session};

/// Fleet-wide apply of dimmer and relay state.
pub struct BatchActuator<'a, T> {
    transport: &'a T,
    registry: &'a FleetRegistry,
    options: SessionOptions,
    concurrency: usize,
}

impl<'a, T: DeviceTransport> BatchActuator<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FleetRegistry, options: SessionOptions) -> Self {
        Self {
            transport,
            registry,
            options,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` devices in flight for atomic and delayed
    /// batches. Manual batches ignore this.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run `plan` across the fleet under `policy`.
    pub async fn apply<G: ConfirmationGate>(
        &self,
        plan: WritePlan,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let started_at = Utc::now();
        info!(
            %plan,
            %policy,
            devices = self.registry.len(),
            concurrency = self.concurrency,
            "batch started"
        );

        let outcomes = if policy.is_manual() || self.concurrency == 1 {
            self.run_sequential(&plan, policy, gate, cancel).await
        } else {
            self.run_pooled(&plan, policy, cancel).await
        };

        let report = BatchReport {
            plan,
            policy,
            cancelled: cancel.is_cancelled(),
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        let summary = report.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed(),
            skipped = summary.skipped,
            "batch finished"
        );
        report
    }

    async fn run_sequential<G: ConfirmationGate>(
        &self,
        plan: &WritePlan,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> Vec<DeviceOutcome> {
        let total = self.registry.len();
        let delay = policy.delay();
        let mut outcomes = Vec::with_capacity(total);
        let mut aborted = false;

        for (index, device) in self.registry.iter().enumerate() {
            if aborted {
                outcomes.push(DeviceOutcome::skipped(index, device, SkipReason::Aborted));
                continue;
            }
            if cancel.is_cancelled() {
                outcomes.push(DeviceOutcome::skipped(index, device, SkipReason::Cancelled));
                continue;
            }

            if policy.is_manual() {
                let answer = tokio::select! {
                    answer = gate.confirm(index, total, device) => Some(answer),
                    () = cancel.cancelled() => None,
                };
                match answer {
                    Some(Confirmation::Proceed) => {}
                    Some(Confirmation::Skip) => {
                        outcomes.push(DeviceOutcome::skipped(
                            index,
                            device,
                            SkipReason::OperatorSkipped,
                        ));
                        continue;
                    }
                    Some(Confirmation::Abort) => {
                        info!(index, "batch aborted by operator");
                        aborted = true;
                        outcomes.push(DeviceOutcome::skipped(index, device, SkipReason::Aborted));
                        continue;
                    }
                    None => {
                        outcomes.push(DeviceOutcome::skipped(index, device, SkipReason::Cancelled));
                        continue;
                    }
                }
            }

            outcomes.push(self.apply_one(index, device, plan).await);

            if !delay.is_zero() && index + 1 < total {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => {}
                }
            }
        }
        outcomes
    }

    async fn run_pooled(
        &self,
        plan: &WritePlan,
        policy: ExecutionPolicy,
        cancel: &CancellationToken,
    ) -> Vec<DeviceOutcome> {
        let start = Instant::now();
        let delay = policy.delay();
        stream::iter(self.registry.iter().enumerate())
            .map(|(index, device)| async move {
                if !delay.is_zero() {
                    let offset = delay.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
                    let slot = start.checked_add(offset).unwrap_or(start);
                    tokio::select! {
                        () = tokio::time::sleep_until(slot) => {}
                        () = cancel.cancelled() => {}
                    }
                }
                if cancel.is_cancelled() {
                    return DeviceOutcome::skipped(index, device, SkipReason::Cancelled);
                }
                self.apply_one(index, device, plan).await
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn apply_one(
        &self,
        index: usize,
        device: &DeviceDescriptor,
        plan: &WritePlan,
    ) -> DeviceOutcome {
        let result = with_session(self.transport, device, &self.options, async |s| {
            s.write_plan(plan).await?;
            Ok(s.read_back().await)
        })
        .await;
        let status = match result {
            Ok(readback) => OutcomeStatus::Applied { readback },
            Err(error) => {
                warn!(endpoint = %device.endpoint, %error, "device failed");
                OutcomeStatus::Failed { error }
            }
        };
        DeviceOutcome::new(index, device, status)
    }
}

/// Batch actuator restricted to the two relay outputs.
///
/// Used to kill or restore lighting without disturbing the dimmer.
pub struct RelayOnlyActuator<'a, T> {
    inner: BatchActuator<'a, T>,
}

impl<'a, T: DeviceTransport> RelayOnlyActuator<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FleetRegistry, options: SessionOptions) -> Self {
        Self {
            inner: BatchActuator::new(transport, registry, options),
        }
    }

    pub fn with_concurrency(self, concurrency: usize) -> Self {
        Self {
            inner: self.inner.with_concurrency(concurrency),
        }
    }

    pub async fn apply<G: ConfirmationGate>(
        &self,
        state: bool,
        policy: ExecutionPolicy,
        gate: &G,
        cancel: &CancellationToken,
    ) -> BatchReport {
        self.inner
            .apply(WritePlan::RelaysOnly { state }, policy, gate, cancel)
            .await
    }
}
