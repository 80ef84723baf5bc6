//! Buyer notification channels.
//!
//! Tracks at most one live connection per buyer. A push to a buyer without a
//! connection is dropped; the domain entity's durable status is the record
//! of truth, and a reconnecting client re-reads it from there.

use dashmap::DashMap;
use tokio::sync::mpsc;

use settlement_types::{BuyerId, BuyerNotification, BuyerNotifier};

/// Registry of live buyer connections.
#[derive(Default)]
pub struct BuyerChannels {
    connections: DashMap<BuyerId, mpsc::UnboundedSender<BuyerNotification>>,
}

impl BuyerChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a buyer's connection, replacing any previous one. The old
    /// connection's receiver closes, which ends its socket task.
    pub fn register(&self, buyer_id: BuyerId) -> mpsc::UnboundedReceiver<BuyerNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(buyer_id, tx);
        rx
    }

    /// Removes a buyer's connection if it is still the registered one.
    pub fn unregister(&self, buyer_id: BuyerId) {
        self.connections.remove_if(&buyer_id, |_, tx| tx.is_closed());
    }

    /// Number of live connections, for diagnostics.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[async_trait::async_trait]
impl BuyerNotifier for BuyerChannels {
    async fn push(&self, buyer_id: BuyerId, notification: BuyerNotification) {
        let Some(tx) = self.connections.get(&buyer_id) else {
            tracing::debug!(%buyer_id, "buyer has no live connection, push dropped");
            return;
        };

        if tx.send(notification).is_err() {
            tracing::debug!(%buyer_id, "buyer connection closed, push dropped");
        }
    }
}
