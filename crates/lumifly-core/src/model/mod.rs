// ── Fleet domain model ──
//
// Plain data shared by the registry, sessions, actuators and reports.

pub mod descriptor;
pub mod outcome;
pub mod target;

pub use descriptor::DeviceDescriptor;
pub use outcome::{
    DeviceOutcome, FieldTriple, OutcomeStatus, ProbeOutcome, ReadOutcome, Readback, SkipReason,
};
pub use target::{CommandTarget, DimLevel, WritePlan};
