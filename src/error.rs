use thiserror::Error;

use crate::types::DeviceId;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, DeakoError>;

/// Errors that can occur when talking to a Deako controller
#[derive(Error, Debug)]
pub enum DeakoError {
    /// The address source ran out of candidates before any controller
    /// accepted a connection
    #[error("No devices found")]
    NoDevicesFound,

    /// TCP connect to one candidate controller failed
    #[error("Connect to {address} failed: {source}")]
    Connect {
        /// The `host:port` that was dialed
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// TCP connect to one candidate controller exceeded the bounded timeout
    #[error("Connect to {address} timed out")]
    ConnectTimeout {
        /// The `host:port` that was dialed
        address: String,
    },

    /// A frame failed to parse as protocol JSON
    #[error("Malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// The device id is not present in the registry
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// Dim level outside the 0-100 range
    #[error("Brightness {0} out of range (0-100)")]
    InvalidBrightness(u8),

    /// Operation requires the session to be in the ready state
    #[error("Not connected")]
    NotConnected,

    /// The controller closed the connection mid-session
    #[error("Connection closed")]
    Disconnected,

    /// Operation attempted after the session was explicitly closed
    #[error("Session closed")]
    SessionClosed,

    /// Subscription receiver fell behind or lost its sender
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
