use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::connection::{Connection, ConnectionEvent};
use crate::error::{DeakoError, Result};
use crate::protocol::{Push, Request};
use crate::registry::{DeviceFields, DeviceRegistry};
use crate::source::AddressSource;
use crate::subscription::{EventReceiver, SessionEvent};
use crate::types::{ControllerEndpoint, Device};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No address, no connection
    Idle,
    /// Pulling the next candidate from the address source
    Resolving,
    /// Dialing a candidate
    Connecting,
    /// Connected; commands are accepted
    Ready,
    /// Explicitly closed, terminal
    Closed,
}

struct ClientInner {
    source: Box<dyn AddressSource>,
    connection: Option<Connection>,
}

/// Client session against one Deako controller.
///
/// The client owns at most one connection at a time. [`connect`] walks the
/// address source, trying each candidate in order until one accepts; once
/// `Ready`, inbound announcements and confirmations flow into the device
/// registry and out to subscribers, while commands go out through
/// [`set_device_state`] and [`request_device_list`].
///
/// A peer disconnect drops the session back to [`SessionState::Idle`] and
/// emits [`SessionEvent::Disconnected`]; reconnecting is the caller's call,
/// via [`reconnect`]. [`close`] is terminal.
///
/// [`connect`]: DeakoClient::connect
/// [`reconnect`]: DeakoClient::reconnect
/// [`close`]: DeakoClient::close
/// [`set_device_state`]: DeakoClient::set_device_state
/// [`request_device_list`]: DeakoClient::request_device_list
pub struct DeakoClient {
    client_name: String,
    registry: Arc<DeviceRegistry>,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
    endpoint: Arc<Mutex<Option<ControllerEndpoint>>>,
    /// Bumped on every connection attempt so a stale connection's events
    /// cannot touch the state of a newer one
    generation: Arc<AtomicU64>,
    cancel: CancellationToken,
    inner: AsyncMutex<ClientInner>,
}

impl DeakoClient {
    /// Create an idle client. `client_name` is sent as the `source` field of
    /// every outbound request so the controller can tell clients apart.
    pub fn new(source: impl AddressSource + 'static, client_name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client_name: client_name.into(),
            registry: Arc::new(DeviceRegistry::new()),
            events,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            endpoint: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
            inner: AsyncMutex::new(ClientInner {
                source: Box::new(source),
                connection: None,
            }),
        }
    }

    /// Connect to the first reachable controller.
    ///
    /// Candidates are pulled from the address source and tried in order;
    /// a candidate that refuses or times out is logged and the next one is
    /// tried. Fails with [`DeakoError::NoDevicesFound`] once the source runs
    /// dry. Any previous connection is torn down first.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if *self.state.lock().unwrap() == SessionState::Closed {
            return Err(DeakoError::SessionClosed);
        }
        if let Some(connection) = inner.connection.take() {
            connection.close();
        }
        *self.endpoint.lock().unwrap() = None;

        loop {
            *self.state.lock().unwrap() = SessionState::Resolving;
            let candidate = tokio::select! {
                _ = self.cancel.cancelled() => {
                    *self.state.lock().unwrap() = SessionState::Closed;
                    return Err(DeakoError::SessionClosed);
                }
                candidate = inner.source.next_address() => candidate,
            };
            let Some(endpoint) = candidate else {
                tracing::warn!("Address source exhausted, no controller reachable");
                *self.state.lock().unwrap() = SessionState::Idle;
                return Err(DeakoError::NoDevicesFound);
            };

            *self.state.lock().unwrap() = SessionState::Connecting;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => {
                    *self.state.lock().unwrap() = SessionState::Closed;
                    return Err(DeakoError::SessionClosed);
                }
                attempt = Connection::open(&endpoint, self.handler(generation)) => attempt,
            };
            match attempt {
                Ok(connection) => {
                    inner.connection = Some(connection);
                    *self.endpoint.lock().unwrap() = Some(endpoint.clone());
                    *self.state.lock().unwrap() = SessionState::Ready;
                    tracing::info!("Session ready with {} ({})", endpoint, endpoint.name);
                    return Ok(());
                }
                Err(err) => tracing::warn!("Candidate {} failed: {}", endpoint, err),
            }
        }
    }

    /// Tear down any current connection and connect again, continuing from
    /// where the address source left off.
    pub async fn reconnect(&self) -> Result<()> {
        tracing::info!("Reconnecting");
        self.connect().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// The endpoint the session is currently bound to, if `Ready`.
    pub fn controller(&self) -> Option<ControllerEndpoint> {
        self.endpoint.lock().unwrap().clone()
    }

    /// The device registry this session projects inbound updates into.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Snapshot of every device announced so far.
    pub fn devices(&self) -> Vec<Device> {
        self.registry.all()
    }

    /// Look up one device by uuid.
    pub fn device(&self, uuid: &str) -> Option<Device> {
        self.registry.get(uuid)
    }

    /// Subscribe to session events. Every subscriber sees every event from
    /// the moment it subscribes.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.events.subscribe())
    }

    /// Ask the controller to announce its devices.
    ///
    /// Announcements arrive asynchronously as registry updates; there is no
    /// synchronous reply. Use [`DeakoClient::find_devices`] to wait a fixed
    /// window and collect the result, or watch [`DeakoClient::subscribe`].
    pub async fn request_device_list(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        self.ensure_ready()?;
        self.send(&inner, Request::device_list(self.client_name.clone()))
    }

    /// Request the device list, wait `window` for announcements to arrive,
    /// and return a registry snapshot.
    pub async fn find_devices(&self, window: Duration) -> Result<Vec<Device>> {
        self.request_device_list().await?;
        tokio::time::sleep(window).await;
        Ok(self.registry.all())
    }

    /// Change one device's power and, optionally, brightness.
    ///
    /// The device must already be known to the registry and `dim` must be
    /// within 0-100; both are checked before anything touches the network.
    /// The local record is updated optimistically so callers observe the
    /// intent immediately; the controller's confirmation arrives later as a
    /// regular push update and is the authoritative value.
    pub async fn set_device_state(&self, uuid: &str, power: bool, dim: Option<u8>) -> Result<()> {
        if !self.registry.contains(uuid) {
            return Err(DeakoError::UnknownDevice(uuid.to_owned()));
        }
        if let Some(level) = dim {
            if level > 100 {
                return Err(DeakoError::InvalidBrightness(level));
            }
        }

        let inner = self.inner.lock().await;
        self.ensure_ready()?;
        self.send(
            &inner,
            Request::control(uuid, power, dim, self.client_name.clone()),
        )?;
        drop(inner);

        self.registry.upsert(
            uuid,
            DeviceFields {
                power: Some(power),
                dim,
                ..Default::default()
            },
        );
        let _ = self.events.send(SessionEvent::DeviceUpdated(uuid.to_owned()));
        Ok(())
    }

    /// Close the session for good. Idempotent; cancels an in-flight
    /// [`DeakoClient::connect`] and tears down any connection. Every
    /// operation afterwards fails with [`DeakoError::SessionClosed`].
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut inner = self.inner.lock().await;
        if let Some(connection) = inner.connection.take() {
            connection.close();
        }
        *self.endpoint.lock().unwrap() = None;
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::Closed {
            tracing::info!("Session closed");
            *state = SessionState::Closed;
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match *self.state.lock().unwrap() {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(DeakoError::SessionClosed),
            _ => Err(DeakoError::NotConnected),
        }
    }

    fn send(&self, inner: &ClientInner, request: Request) -> Result<()> {
        match &inner.connection {
            Some(connection) => connection.send(request),
            None => Err(DeakoError::NotConnected),
        }
    }

    /// Build the per-connection event handler. `generation` pins it to the
    /// connection it was created for.
    fn handler(&self, generation: u64) -> impl FnMut(ConnectionEvent) + Send + 'static {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let endpoint = Arc::clone(&self.endpoint);
        let current = Arc::clone(&self.generation);
        move |event| match event {
            ConnectionEvent::Push(push) => {
                if current.load(Ordering::SeqCst) == generation {
                    apply_push(&registry, &events, push);
                }
            }
            ConnectionEvent::Closed => {
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                let mut state = state.lock().unwrap();
                if *state == SessionState::Ready {
                    *state = SessionState::Idle;
                    *endpoint.lock().unwrap() = None;
                    tracing::info!("Session disconnected");
                    let _ = events.send(SessionEvent::Disconnected);
                }
            }
        }
    }
}

/// Project one inbound message into the registry and notify subscribers.
fn apply_push(registry: &DeviceRegistry, events: &broadcast::Sender<SessionEvent>, push: Push) {
    match push {
        Push::DeviceFound { data } => {
            let uuid = data.uuid;
            registry.upsert(
                &uuid,
                DeviceFields {
                    name: Some(data.name),
                    capabilities: Some(data.capabilities),
                    power: data.state.power,
                    dim: data.state.dim,
                },
            );
            let _ = events.send(SessionEvent::DeviceUpdated(uuid));
        }
        Push::StateChanged { data } => {
            let uuid = data.target;
            registry.upsert(
                &uuid,
                DeviceFields {
                    power: data.state.power,
                    dim: data.state.dim,
                    ..Default::default()
                },
            );
            let _ = events.send(SessionEvent::DeviceUpdated(uuid));
        }
        Push::Other => {}
    }
}
