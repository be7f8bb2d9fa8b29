// ── Reports ──
//
// Aggregates over outcome sequences. Everything here is pure data so
// rendering and summaries can be tested without any I/O.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::model::{DeviceOutcome, ProbeOutcome, ReadOutcome, WritePlan};
use crate::policy::ExecutionPolicy;

/// Result of an availability probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub outcomes: Vec<ProbeOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProbeReport {
    /// Endpoints that accepted a session, in registry order.
    pub fn reachable(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.reachable)
            .map(|o| o.endpoint.as_str())
            .collect()
    }

    pub fn unreachable(&self) -> Vec<&ProbeOutcome> {
        self.outcomes.iter().filter(|o| !o.reachable).collect()
    }
}

/// Result of reading every device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadReport {
    pub outcomes: Vec<ReadOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ReadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Result of one batch apply.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub plan: WritePlan,
    pub policy: ExecutionPolicy,
    pub outcomes: Vec<DeviceOutcome>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_outcomes(&self.outcomes)
    }
}

// The derived summary travels with the outcomes in every serialized form.
impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BatchReport", 7)?;
        state.serialize_field("plan", &self.plan)?;
        state.serialize_field("policy", &self.policy)?;
        state.serialize_field("outcomes", &self.outcomes)?;
        state.serialize_field("cancelled", &self.cancelled)?;
        state.serialize_field("summary", &self.summary())?;
        state.serialize_field("started_at", &self.started_at)?;
        state.serialize_field("finished_at", &self.finished_at)?;
        state.end()
    }
}

/// A device that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDevice {
    pub endpoint: String,
    pub reason: String,
}

/// Success/failure/skip counts over a batch.
///
/// `Display` renders the headline (`"2 succeeded / 1 failed"`); the
/// alternate form (`{:#}`) appends one line per failed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<FailedDevice>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[DeviceOutcome]) -> Self {
        let failures = outcomes
            .iter()
            .filter_map(|o| {
                o.error().map(|e| FailedDevice {
                    endpoint: o.endpoint.clone(),
                    reason: e.to_string(),
                })
            })
            .collect();
        Self {
            succeeded: outcomes.iter().filter(|o| o.is_applied()).count(),
            skipped: outcomes.iter().filter(|o| o.is_skipped()).count(),
            failures,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Every device was applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded / {} failed", self.succeeded, self.failed())?;
        if self.skipped > 0 {
            write!(f, " / {} skipped", self.skipped)?;
        }
        if f.alternate() {
            for failure in &self.failures {
                write!(f, "\n  {}: {}", failure.endpoint, failure.reason)?;
            }
        }
        Ok(())
    }
}
