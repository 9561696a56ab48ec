//! Rust library for controlling Deako smart lighting over the local TCP bridge
//!
//! Deako controllers accept a JSON-over-TCP connection on the LAN and relay
//! commands to the lights they manage. This library keeps one session to a
//! controller. It supports:
//!
//! - Connecting to the first reachable controller from a list of candidates
//! - Device list requests, with every announcement projected into an
//!   in-memory [`DeviceRegistry`]
//! - Power and brightness control with optimistic local state
//! - Real-time session event subscriptions
//!
//! Service discovery is deliberately left to the caller: anything that can
//! yield `(address, name)` candidates works as an [`AddressSource`], and
//! [`StaticAddresses`] covers the common case of already knowing where the
//! controller lives.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use deako_local::{ControllerEndpoint, DeakoClient, StaticAddresses};
//!
//! #[tokio::main]
//! async fn main() -> deako_local::Result<()> {
//!     let source = StaticAddresses::single(ControllerEndpoint::new(
//!         "192.168.1.40",
//!         23,
//!         "deako-bridge",
//!     ));
//!     let client = DeakoClient::new(source, "my-integration");
//!
//!     client.connect().await?;
//!     for device in client.find_devices(Duration::from_secs(5)).await? {
//!         println!("{} ({}) power={}", device.name, device.uuid, device.state.power);
//!     }
//!
//!     // Turn the first device on at 60% brightness.
//!     if let Some(device) = client.devices().first() {
//!         client.set_device_state(&device.uuid, true, Some(60)).await?;
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! To react to changes as they happen, hold on to a subscription:
//!
//! ```no_run
//! # async fn demo(client: deako_local::DeakoClient) -> deako_local::Result<()> {
//! let mut events = client.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod codec;
mod connection;
mod error;
mod protocol;
mod registry;
mod source;
mod subscription;
mod types;

pub use client::{DeakoClient, SessionState};
pub use error::{DeakoError, Result};
pub use registry::DeviceRegistry;
pub use source::{AddressSource, StaticAddresses};
pub use subscription::{EventReceiver, SessionEvent};
pub use types::{ControllerEndpoint, Device, DeviceId, DeviceState};
