//! Direct-message delivery between connections.

use std::sync::Arc;
use std::time::Duration;

use parley_protocol::Response;

use crate::{DeliveryError, Outbound, PresenceRegistry};

/// Default time a sender waits for room in a recipient's queue.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// What happened to a direct message.
///
/// Only `RecipientNotFound` is visible to the sender (as `NOT_FOUND`).
/// Delivery is best-effort: a message enqueued for a recipient that drops
/// a moment later is lost without notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueued on the recipient's connection.
    Delivered,
    /// The recipient is not online; the sender was told.
    RecipientNotFound,
    /// The recipient was online but its queue was full or closed.
    Dropped,
}

/// Resolves recipients through the [`PresenceRegistry`] and enqueues
/// messages on their connections.
#[derive(Debug, Clone)]
pub struct MessageDelivery {
    presence: Arc<PresenceRegistry>,
    timeout: Duration,
}

impl MessageDelivery {
    /// Creates a delivery service over `presence`.
    ///
    /// `timeout` bounds how long a sender's task may wait on a slow
    /// recipient before the message is dropped.
    pub fn new(presence: Arc<PresenceRegistry>, timeout: Duration) -> Self {
        Self { presence, timeout }
    }

    /// Sends `body` from `sender` to `recipient`.
    ///
    /// The recipient receives `"<sender>: <body>"`. If the recipient is not
    /// online, `NOT_FOUND` is enqueued on `from`, the sender's own
    /// connection, and nothing is written anywhere else.
    ///
    /// # Errors
    /// Returns a [`DeliveryError`] only when the sender's own queue is
    /// closed while reporting `NOT_FOUND`.
    pub async fn send(
        &self,
        from: &Outbound,
        sender: &str,
        recipient: &str,
        body: &str,
    ) -> Result<Delivery, DeliveryError> {
        let Some(target) = self.presence.lookup(recipient).await else {
            tracing::debug!(%sender, %recipient, "recipient not online");
            from.send(Response::NotFound).await?;
            return Ok(Delivery::RecipientNotFound);
        };

        let message = Response::Direct {
            sender: sender.to_string(),
            body: body.to_string(),
        };
        match target.send_timeout(message, self.timeout).await {
            Ok(()) => {
                tracing::debug!(%sender, %recipient, conn_id = %target.conn_id(), "message delivered");
                Ok(Delivery::Delivered)
            }
            Err(DeliveryError::Closed(conn_id)) => {
                // The recipient's worker is gone but its entry lingers.
                self.presence.unregister_if(recipient, conn_id).await;
                tracing::debug!(%sender, %recipient, %conn_id, "recipient closed, dropping stale presence");
                Ok(Delivery::Dropped)
            }
            Err(DeliveryError::Timeout(conn_id)) => {
                tracing::warn!(%sender, %recipient, %conn_id, "recipient queue full, message dropped");
                Ok(Delivery::Dropped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_transport::ConnectionId;

    use super::*;

    fn setup() -> (Arc<PresenceRegistry>, MessageDelivery) {
        let presence = Arc::new(PresenceRegistry::new());
        let delivery = MessageDelivery::new(Arc::clone(&presence), Duration::from_millis(50));
        (presence, delivery)
    }

    #[tokio::test]
    async fn test_send_to_online_recipient_delivers_only_to_recipient() {
        let (presence, delivery) = setup();
        let (alice, mut alice_rx) = Outbound::channel(ConnectionId::new(1), 8);
        let (bob, mut bob_rx) = Outbound::channel(ConnectionId::new(2), 8);
        presence.register("alice", alice.clone()).await;
        presence.register("bob", bob).await;

        let outcome = delivery.send(&alice, "alice", "bob", "hello").await.unwrap();

        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(
            bob_rx.try_recv().unwrap(),
            Response::Direct {
                sender: "alice".into(),
                body: "hello".into(),
            }
        );
        assert!(alice_rx.try_recv().is_err(), "sender gets no acknowledgment");
    }

    #[tokio::test]
    async fn test_send_to_offline_recipient_reports_not_found_to_sender() {
        let (presence, delivery) = setup();
        let (alice, mut alice_rx) = Outbound::channel(ConnectionId::new(1), 8);
        presence.register("alice", alice.clone()).await;

        let outcome = delivery.send(&alice, "alice", "bob", "hello").await.unwrap();

        assert_eq!(outcome, Delivery::RecipientNotFound);
        assert_eq!(alice_rx.try_recv().unwrap(), Response::NotFound);
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_closed_recipient_drops_stale_presence() {
        let (presence, delivery) = setup();
        let (alice, mut alice_rx) = Outbound::channel(ConnectionId::new(1), 8);
        let (bob, bob_rx) = Outbound::channel(ConnectionId::new(2), 8);
        presence.register("bob", bob).await;
        drop(bob_rx);

        let outcome = delivery.send(&alice, "alice", "bob", "hello").await.unwrap();

        assert_eq!(outcome, Delivery::Dropped);
        assert!(!presence.contains("bob").await);
        assert!(alice_rx.try_recv().is_err(), "drops are not reported");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_to_full_recipient_times_out_without_blocking() {
        let (presence, delivery) = setup();
        let (alice, _alice_rx) = Outbound::channel(ConnectionId::new(1), 8);
        let (bob, _bob_rx) = Outbound::channel(ConnectionId::new(2), 1);
        presence.register("bob", bob).await;

        let first = delivery.send(&alice, "alice", "bob", "one").await.unwrap();
        let second = delivery.send(&alice, "alice", "bob", "two").await.unwrap();

        assert_eq!(first, Delivery::Delivered);
        assert_eq!(second, Delivery::Dropped);
        assert!(presence.contains("bob").await, "slow is not gone");
    }
}
