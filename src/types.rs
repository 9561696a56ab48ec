use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identifier (the UUID string assigned by the controller)
pub type DeviceId = String;

/// TCP endpoint of a controller, as resolved by an address source
///
/// The host/port pair is immutable once resolved; `name` is whatever friendly
/// name the discovery layer reported (an mDNS instance name or a cache entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerEndpoint {
    pub host: String,
    pub port: u16,
    /// Friendly name reported by the discovery layer
    pub name: String,
}

impl ControllerEndpoint {
    /// Create an endpoint from its parts
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
        }
    }
}

impl fmt::Display for ControllerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Last-known state of one lighting device
///
/// `dim` is absent for devices that only switch (no dimmer capability) or
/// whose brightness the controller has not reported yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub power: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<u8>,
}

/// One device record in the registry
///
/// Records are built incrementally from controller push messages and are never
/// removed during a session; a device that stops announcing itself is simply
/// unknown, not deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub uuid: DeviceId,
    /// Display name, empty until the controller has announced the device
    pub name: String,
    pub state: DeviceState,
    /// Capability labels such as `power` or `dim`
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Device {
    /// Whether the device advertises the given capability
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}
