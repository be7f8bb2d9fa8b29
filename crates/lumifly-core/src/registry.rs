// ── Fleet registry ──
//
// The static, ordered roster of devices. Order defines iteration and
// report order only; it carries no priority.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::model::DeviceDescriptor;

/// Ordered, non-empty list of device descriptors with unique
/// (endpoint, namespace) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl FleetRegistry {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Result<Self, CoreError> {
        if devices.is_empty() {
            return Err(CoreError::EmptyRegistry);
        }
        let mut seen: HashMap<(&str, u16), usize> = HashMap::with_capacity(devices.len());
        for (index, device) in devices.iter().enumerate() {
            let key = (device.endpoint_key(), device.namespace.index());
            if let Some(&first) = seen.get(&key) {
                return Err(CoreError::DuplicateDevice {
                    endpoint: device.endpoint.clone(),
                    namespace: device.namespace.to_string(),
                    first,
                    second: index,
                });
            }
            seen.insert(key, index);
        }
        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceDescriptor> {
        self.devices.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceDescriptor> {
        self.devices.iter()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Look up a device by name or endpoint.
    pub fn find(&self, key: &str) -> Option<(usize, &DeviceDescriptor)> {
        let wanted = key.trim_end_matches('/');
        self.devices
            .iter()
            .enumerate()
            .find(|(_, d)| d.name.as_deref() == Some(key) || d.endpoint_key() == wanted)
    }
}

impl<'a> IntoIterator for &'a FleetRegistry {
    type Item = &'a DeviceDescriptor;
    type IntoIter = std::slice::Iter<'a, DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}
