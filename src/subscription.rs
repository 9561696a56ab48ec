use tokio::sync::broadcast;

use crate::error::{DeakoError, Result};
use crate::types::DeviceId;

/// Notifications delivered to subscribers as the session observes changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A device record was created or updated in the registry
    DeviceUpdated(DeviceId),
    /// The controller connection dropped and the session went back to idle
    Disconnected,
}

/// Receiving half of a session subscription.
///
/// Every subscriber gets its own copy of every event, in publish order. A
/// subscriber that falls further behind than the channel capacity loses the
/// oldest events and sees a single [`DeakoError::ChannelError`] telling it
/// how many were dropped.
#[derive(Debug)]
pub struct EventReceiver {
    rx: broadcast::Receiver<SessionEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<SessionEvent> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Closed) => Err(DeakoError::SessionClosed),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(DeakoError::ChannelError(
                format!("Lagged by {} events", n),
            )),
        }
    }

    /// Poll for an event without waiting. `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(DeakoError::SessionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(DeakoError::ChannelError(
                format!("Lagged by {} events", n),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_publish_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut receiver = EventReceiver::new(rx);

        tx.send(SessionEvent::DeviceUpdated("d1".into())).unwrap();
        tx.send(SessionEvent::Disconnected).unwrap();

        assert_eq!(
            receiver.recv().await.unwrap(),
            SessionEvent::DeviceUpdated("d1".into())
        );
        assert_eq!(receiver.recv().await.unwrap(), SessionEvent::Disconnected);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let (tx, rx) = broadcast::channel(8);
        let mut first = EventReceiver::new(rx);
        let mut second = EventReceiver::new(tx.subscribe());

        tx.send(SessionEvent::DeviceUpdated("d1".into())).unwrap();

        assert_eq!(
            first.recv().await.unwrap(),
            SessionEvent::DeviceUpdated("d1".into())
        );
        assert_eq!(
            second.recv().await.unwrap(),
            SessionEvent::DeviceUpdated("d1".into())
        );
    }

    #[tokio::test]
    async fn recv_after_the_session_is_gone_reports_closed() {
        let (tx, rx) = broadcast::channel(8);
        let mut receiver = EventReceiver::new(rx);
        drop(tx);

        assert!(matches!(
            receiver.recv().await,
            Err(DeakoError::SessionClosed)
        ));
    }

    #[test]
    fn try_recv_on_an_empty_channel_is_not_an_error() {
        let (_tx, rx) = broadcast::channel(8);
        let mut receiver = EventReceiver::new(rx);
        assert!(receiver.try_recv().unwrap().is_none());
    }
}
