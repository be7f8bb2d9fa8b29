// ── Per-device outcomes ──
//
// Every fleet operation produces one record per registry entry, in
// registry order. Reporting is a pure function over these records.

use std::fmt;

use lumifly_api::FieldValue;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use strum::Display;

use crate::error::DeviceError;
use crate::model::DeviceDescriptor;

/// The (dim, front, back) state of one module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldTriple {
    pub dim: FieldValue,
    pub front: bool,
    pub back: bool,
}

impl fmt::Display for FieldTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dim={} front={} back={}", self.dim, self.front, self.back)
    }
}

/// Read-back after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readback {
    Confirmed(FieldTriple),
    /// Writes succeeded but the confirming read did not.
    Unknown { reason: String },
}

impl Readback {
    pub fn fields(&self) -> Option<&FieldTriple> {
        match self {
            Self::Confirmed(fields) => Some(fields),
            Self::Unknown { .. } => None,
        }
    }
}

/// Why a device was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The batch was cancelled before this device started.
    Cancelled,
    /// The operator chose to skip this device.
    OperatorSkipped,
    /// The operator aborted the batch at or before this device.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied { readback: Readback },
    Failed { error: DeviceError },
    Skipped { reason: SkipReason },
}

/// Result of one batch step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceOutcome {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub endpoint: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl DeviceOutcome {
    pub fn new(index: usize, device: &DeviceDescriptor, status: OutcomeStatus) -> Self {
        Self {
            index,
            name: device.name.clone(),
            endpoint: device.endpoint.clone(),
            status,
        }
    }

    pub fn skipped(index: usize, device: &DeviceDescriptor, reason: SkipReason) -> Self {
        Self::new(index, device, OutcomeStatus::Skipped { reason })
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    pub fn error(&self) -> Option<&DeviceError> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Confirmed read-back values, if the device was applied and read back.
    pub fn readback(&self) -> Option<&FieldTriple> {
        match &self.status {
            OutcomeStatus::Applied { readback } => readback.fields(),
            _ => None,
        }
    }
}

/// Result of reading one device.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub index: usize,
    pub name: Option<String>,
    pub endpoint: String,
    pub result: Result<FieldTriple, DeviceError>,
}

impl ReadOutcome {
    pub fn new(
        index: usize,
        device: &DeviceDescriptor,
        result: Result<FieldTriple, DeviceError>,
    ) -> Self {
        Self {
            index,
            name: device.name.clone(),
            endpoint: device.endpoint.clone(),
            result,
        }
    }
}

// Flattened: success carries dim/front/back, failure carries error.
impl Serialize for ReadOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ReadOutcome", 6)?;
        state.serialize_field("index", &self.index)?;
        match &self.name {
            Some(name) => state.serialize_field("name", name)?,
            None => state.skip_field("name")?,
        }
        state.serialize_field("endpoint", &self.endpoint)?;
        match &self.result {
            Ok(fields) => {
                state.serialize_field("dim", &fields.dim)?;
                state.serialize_field("front", &fields.front)?;
                state.serialize_field("back", &fields.back)?;
                state.skip_field("error")?;
            }
            Err(error) => {
                state.skip_field("dim")?;
                state.skip_field("front")?;
                state.skip_field("back")?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// Reachability of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub endpoint: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceError>,
}

impl ProbeOutcome {
    pub fn new(index: usize, device: &DeviceDescriptor, result: Result<(), DeviceError>) -> Self {
        Self {
            index,
            name: device.name.clone(),
            endpoint: device.endpoint.clone(),
            reachable: result.is_ok(),
            error: result.err(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumifly_api::{Namespace, NodeIdentifier};

    fn device() -> DeviceDescriptor {
        DeviceDescriptor::new(
            "opc.tcp://h:4840",
            Namespace::new(2),
            [
                NodeIdentifier::Numeric(2),
                NodeIdentifier::Numeric(3),
                NodeIdentifier::Numeric(4),
            ],
        )
    }

    #[test]
    fn applied_outcome_serializes_flat() {
        let outcome = DeviceOutcome::new(
            0,
            &device(),
            OutcomeStatus::Applied {
                readback: Readback::Confirmed(FieldTriple {
                    dim: FieldValue::UInt16(5000),
                    front: true,
                    back: true,
                }),
            },
        );
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "applied");
        assert_eq!(json["readback"]["state"], "confirmed");
        assert_eq!(json["readback"]["dim"], 5000);
        assert!(json.get("name").is_none());
    }

    #[test]
    fn read_outcome_carries_fields_or_error() {
        let ok = ReadOutcome::new(
            0,
            &device(),
            Ok(FieldTriple {
                dim: FieldValue::UInt16(7000),
                front: false,
                back: true,
            }),
        );
        let json = serde_json::to_value(&ok).expect("serialize");
        assert_eq!(json["dim"], 7000);
        assert_eq!(json["back"], true);
        assert!(json.get("error").is_none());

        let failed = ReadOutcome::new(
            1,
            &device(),
            Err(DeviceError::Read {
                node: "ns=2;i=2".into(),
                reason: "timeout".into(),
            }),
        );
        let json = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(json["error"]["kind"], "read");
        assert!(json.get("dim").is_none());
    }

    #[test]
    fn skip_reasons_render_snake_case() {
        assert_eq!(SkipReason::OperatorSkipped.to_string(), "operator_skipped");
    }
}
