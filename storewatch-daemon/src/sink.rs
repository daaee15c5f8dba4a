//! Where "the store changed" notifications go.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::PublishError;

/// Fan-out target for change notifications.
///
/// Implementations are called from the notifier thread and must do their own
/// synchronization.
pub trait BroadcastSink: Send + Sync {
    fn publish(&self, event: &str) -> Result<(), PublishError>;
}

impl<F> BroadcastSink for F
where
    F: Fn(&str) -> Result<(), PublishError> + Send + Sync,
{
    fn publish(&self, event: &str) -> Result<(), PublishError> {
        self(event)
    }
}

/// One notification as delivered to subscribers. Carries no payload beyond its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Subscribers that fall behind by more than the channel capacity skip the
/// notifications they missed; any later notification still tells them to re-fetch.
#[derive(Debug)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Notification>,
    published: AtomicU64,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Notifications published since the hub was created, delivered or not.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl BroadcastSink for BroadcastHub {
    fn publish(&self, event: &str) -> Result<(), PublishError> {
        self.published.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            event: event.to_string(),
        };
        match self.tx.send(notification) {
            Ok(receivers) => tracing::debug!(event, receivers, "notification fanned out"),
            // No subscribers connected: nothing to deliver.
            Err(_) => tracing::debug!(event, "notification published with no subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn publish_without_subscribers_is_ok() {
        let hub = BroadcastHub::new(4);
        hub.publish("database_update").expect("publish");
        assert_eq!(hub.published(), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_notification() {
        let hub = BroadcastHub::new(4);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish("database_update").expect("publish");

        for rx in [&mut first, &mut second] {
            let got = rx.recv().await.expect("notification");
            assert_eq!(got.event, "database_update");
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_latest() {
        let hub = BroadcastHub::new(2);
        let mut rx = hub.subscribe();
        for _ in 0..5 {
            hub.publish("database_update").expect("publish");
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.expect("after lag").event, "database_update");
    }

    #[test]
    fn closures_are_sinks() {
        let sink = |event: &str| -> Result<(), PublishError> {
            assert_eq!(event, "database_update");
            Err(PublishError::Failed("offline".to_string()))
        };
        let err = BroadcastSink::publish(&sink, "database_update").unwrap_err();
        assert!(err.to_string().contains("offline"));
    }
}
