// lumifly-api: Device transport capability for OPC-UA lighting modules

pub mod error;
pub mod node;
#[cfg(feature = "opcua")]
pub mod opcua;
pub mod sim;
pub mod transport;
pub mod value;

pub use error::TransportError;
pub use node::{AddressError, Namespace, NodeAddress, NodeIdentifier};
#[cfg(feature = "opcua")]
pub use opcua::{OpcUaHandle, OpcUaTransport};
pub use sim::{FaultPlan, ModuleField, ModuleSpec, ModuleState, SimHandle, SimulatedFleet};
pub use transport::DeviceTransport;
pub use value::{FieldType, FieldValue, ValueError};
