// ── Execution policies and confirmation gates ──
//
// Policies change pacing and confirmation only; every policy writes the
// same values in the same per-device order.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::{Mutex, mpsc};

use crate::error::CoreError;
use crate::model::DeviceDescriptor;

/// How a batch walks the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Every device back-to-back.
    #[default]
    Atomic,
    /// A pause of `delay` between consecutive devices. Under concurrency the
    /// pause becomes a global start schedule.
    Delayed {
        #[serde(rename = "delay_secs", serialize_with = "as_secs")]
        delay: Duration,
    },
    /// An operator confirmation before each device. Always sequential.
    ManualStepped,
}

fn as_secs<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(delay.as_secs_f64())
}

impl ExecutionPolicy {
    /// Build a delayed policy from user-supplied seconds.
    pub fn delayed_secs(secs: f64) -> Result<Self, CoreError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(CoreError::input(
                "delay",
                format!("{secs} is not a non-negative number of seconds"),
            ));
        }
        Duration::try_from_secs_f64(secs)
            .map(|delay| Self::Delayed { delay })
            .map_err(|e| CoreError::input("delay", e.to_string()))
    }

    /// Pause between devices; zero for atomic and manual batches.
    pub fn delay(&self) -> Duration {
        match self {
            Self::Delayed { delay } => *delay,
            Self::Atomic | Self::ManualStepped => Duration::ZERO,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Self::ManualStepped)
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => f.write_str("atomic"),
            Self::Delayed { delay } => write!(f, "delayed ({}s)", delay.as_secs_f64()),
            Self::ManualStepped => f.write_str("manual"),
        }
    }
}

// ── Confirmation gate ───────────────────────────────────────────────

/// Operator answer for one device in a manual batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Skip,
    Abort,
}

/// Source of per-device "proceed" signals for [`ExecutionPolicy::ManualStepped`].
pub trait ConfirmationGate: Send + Sync {
    /// Wait for a decision on device `index` (0-based) of `total`.
    fn confirm(
        &self,
        index: usize,
        total: usize,
        device: &DeviceDescriptor,
    ) -> impl Future<Output = Confirmation> + Send;
}

/// Gate that always proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    async fn confirm(
        &self,
        _index: usize,
        _total: usize,
        _device: &DeviceDescriptor,
    ) -> Confirmation {
        Confirmation::Proceed
    }
}

/// Gate fed by a channel. Dropping every sender aborts the batch.
#[derive(Debug)]
pub struct ChannelGate {
    rx: Mutex<mpsc::Receiver<Confirmation>>,
}

impl ChannelGate {
    pub fn new(buffer: usize) -> (mpsc::Sender<Confirmation>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx: Mutex::new(rx) })
    }
}

impl ConfirmationGate for ChannelGate {
    async fn confirm(
        &self,
        _index: usize,
        _total: usize,
        _device: &DeviceDescriptor,
    ) -> Confirmation {
        self.rx.lock().await.recv().await.unwrap_or(Confirmation::Abort)
    }
}
