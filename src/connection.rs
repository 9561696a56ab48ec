use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::codec::DeakoCodec;
use crate::error::{DeakoError, Result};
use crate::protocol::{Push, Request};
use crate::types::ControllerEndpoint;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the reader task reports back to the session layer.
pub(crate) enum ConnectionEvent {
    /// A decoded inbound message
    Push(Push),
    /// The stream ended, either EOF from the peer or a fatal read error
    Closed,
}

/// One TCP connection to a controller.
///
/// Writing goes through an unbounded channel drained by a writer task, so
/// callers never block on socket backpressure; reading runs in its own task
/// and hands every decoded frame to the `on_event` callback. Dropping the
/// connection aborts both tasks.
pub(crate) struct Connection {
    tx: mpsc::UnboundedSender<Request>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Connection {
    /// Dial `endpoint` and start the reader and writer tasks.
    ///
    /// `on_event` is invoked from the reader task for every inbound message
    /// and exactly once with [`ConnectionEvent::Closed`] when the stream ends
    /// on its own. An aborted connection (via [`Connection::close`] or drop)
    /// does not emit `Closed`.
    pub(crate) async fn open(
        endpoint: &ControllerEndpoint,
        mut on_event: impl FnMut(ConnectionEvent) + Send + 'static,
    ) -> Result<Self> {
        let address = endpoint.to_string();
        tracing::info!("Connecting to {} ({})", address, endpoint.name);

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(DeakoError::Connect { address, source }),
            Err(_) => return Err(DeakoError::ConnectTimeout { address }),
        };
        tracing::info!("Connected to {}", address);

        let framed = Framed::new(stream, DeakoCodec::new());
        let (mut sink, mut frames) = framed.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        let write_task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                if let Err(err) = sink.send(request).await {
                    tracing::error!("Failed to send request: {}", err);
                    break;
                }
            }
        });

        let peer = address;
        let read_task = tokio::spawn(async move {
            loop {
                match frames.next().await {
                    Some(Ok(push)) => on_event(ConnectionEvent::Push(push)),
                    Some(Err(err)) => {
                        tracing::error!("Connection error: {}", err);
                        break;
                    }
                    None => break,
                }
            }
            tracing::info!("Connection to {} closed by peer", peer);
            on_event(ConnectionEvent::Closed);
        });

        Ok(Self {
            tx,
            read_task,
            write_task,
        })
    }

    /// Queue a request for the writer task.
    pub(crate) fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| DeakoError::Disconnected)
    }

    /// Tear the connection down without emitting a `Closed` event.
    pub(crate) fn close(&self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
