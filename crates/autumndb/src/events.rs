//! Event bus (component F).
//!
//! Publish/subscribe. Per the redesign of the source's synchronous-callback
//! fan-out, each subscriber owns an independent bounded channel; [`EventBus::publish`]
//! sends to every subscriber without waiting for any of them to drain, so a
//! slow or stalled subscriber cannot stall the operation engine.

use tokio::sync::mpsc;
use tracing::warn;

use crate::codec::OpCode;

/// Capacity of each subscriber's event channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// A post-commit event published after a mutating operation succeeds.
///
/// Event codes match the wire op codes (§6): `op` is always one of
/// `CreateDoc`, `UpdateDoc`, `DeleteDoc`, `CreateCollection`, `DeleteCollection` —
/// the operation engine (component E) never enqueues a read, so no
/// `ReadDoc` event is ever published.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A document-oriented mutation: create, update or delete.
    Document {
        /// The mutation that occurred.
        op: OpCode,
        /// Name of the collection the document lives in.
        collection: String,
        /// Id of the affected document.
        id: String,
    },
    /// A collection-oriented mutation: create or delete.
    Collection {
        /// The mutation that occurred.
        op: OpCode,
        /// Name of the affected collection.
        collection: String,
    },
}

impl Event {
    /// Returns the collection name this event pertains to.
    pub fn collection(&self) -> &str {
        match self {
            Self::Document { collection, .. } | Self::Collection { collection, .. } => collection,
        }
    }
}

/// Fan-out publish/subscribe bus for post-commit events.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: std::sync::Mutex<Vec<mpsc::Sender<Event>>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self { Self::default() }

    /// Registers a new subscriber, returning its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(tx);
        rx
    }

    /// Publishes `event` to every current subscriber.
    ///
    /// Uses `try_send` so a subscriber with a full channel is skipped (and
    /// logged) rather than blocking the caller; dead subscribers (receiver
    /// dropped) are pruned on the next publish.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("event subscriber channel full, dropping event for {}", event.collection());
                true
            },
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(Event::Document {
            op: OpCode::CreateDoc,
            collection: "users".to_string(),
            id: "doc1".to_string(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(
            received,
            Event::Document {
                op: OpCode::CreateDoc,
                collection: "users".to_string(),
                id: "doc1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive_the_same_event() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(Event::Collection {
            op: OpCode::CreateCollection,
            collection: "users".to_string(),
        });

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_without_error() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe();
        }
        // The receiver above is dropped; publish must not panic and should prune it.
        bus.publish(Event::Collection {
            op: OpCode::DeleteCollection,
            collection: "users".to_string(),
        });
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn full_subscriber_channel_does_not_block_publish() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for _ in 0..SUBSCRIBER_CHANNEL_CAPACITY + 10 {
            bus.publish(Event::Collection {
                op: OpCode::CreateCollection,
                collection: "users".to_string(),
            });
        }

        // The channel is full but the publisher above never blocked; draining
        // still yields events.
        assert!(rx.recv().await.is_some());
    }
}
