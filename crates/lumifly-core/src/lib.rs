// lumifly-core: Fleet orchestration between lumifly-api transports and consumers (CLI).

pub mod actuator;
pub mod controller;
pub mod error;
pub mod model;
pub mod policy;
pub mod prober;
pub mod reader;
pub mod registry;
pub mod report;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use actuator::{BatchActuator, RelayOnlyActuator};
pub use controller::{FleetController, FleetOptions};
pub use error::{CoreError, DeviceError};
pub use policy::{AutoConfirm, ChannelGate, Confirmation, ConfirmationGate, ExecutionPolicy};
pub use prober::AvailabilityProber;
pub use reader::StateReader;
pub use registry::FleetRegistry;
pub use report::{BatchReport, BatchSummary, FailedDevice, ProbeReport, ReadReport};
pub use session::{DeviceSession, SessionOptions, with_session};

pub use model::{
    CommandTarget, DeviceDescriptor, DeviceOutcome, DimLevel, FieldTriple, OutcomeStatus,
    ProbeOutcome, ReadOutcome, Readback, SkipReason, WritePlan,
};

pub use tokio_util::sync::CancellationToken;
