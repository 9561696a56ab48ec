use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::types::{Device, DeviceId, DeviceState};

/// Partial device fields carried by one inbound message. Absent fields leave
/// the stored record untouched.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeviceFields {
    pub name: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub power: Option<bool>,
    pub dim: Option<u8>,
}

/// In-memory table of every device the controller has announced, keyed by
/// uuid. One record per uuid; later announcements merge into earlier ones.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<BTreeMap<DeviceId, Device>>,
}

impl DeviceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create or merge one record. A record created here starts with an empty
    /// name and default state until a message fills them in.
    pub(crate) fn upsert(&self, uuid: &str, fields: DeviceFields) {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.entry(uuid.to_owned()).or_insert_with(|| Device {
            uuid: uuid.to_owned(),
            name: String::new(),
            state: DeviceState::default(),
            capabilities: Vec::new(),
        });
        if let Some(name) = fields.name {
            device.name = name;
        }
        if let Some(capabilities) = fields.capabilities {
            device.capabilities = capabilities;
        }
        if let Some(power) = fields.power {
            device.state.power = power;
        }
        if let Some(dim) = fields.dim {
            device.state.dim = Some(dim);
        }
    }

    /// Look up one device by uuid.
    pub fn get(&self, uuid: &str) -> Option<Device> {
        self.devices.lock().unwrap().get(uuid).cloned()
    }

    /// Snapshot of every known device, ordered by uuid.
    pub fn all(&self) -> Vec<Device> {
        self.devices.lock().unwrap().values().cloned().collect()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.devices.lock().unwrap().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
