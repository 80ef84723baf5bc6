//! In-process settlement message bus.
//!
//! Topic semantics over tokio channels: messages are serialized JSON bytes
//! routed by key, and every subscriber of a key receives its own copy.
//! Consumers decode at their own boundary, exactly as they would against an
//! external broker, so a malformed payload is a consumer-side drop rather
//! than a publisher-side panic.

use dashmap::DashMap;
use tokio::sync::mpsc;

use settlement_types::{BusError, SettlementEvent, SettlementPublisher};

/// Routing-keyed fan-out bus.
#[derive(Default)]
pub struct InProcessBus {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription for `routing_key`. Messages published
    /// after this call are delivered to the returned receiver.
    pub fn subscribe(&self, routing_key: &str) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(routing_key.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Publishes raw bytes under a routing key. Subscribers whose receiver
    /// was dropped are pruned on the way through.
    pub fn publish_raw(&self, routing_key: &str, payload: &[u8]) -> Result<(), BusError> {
        let Some(mut entry) = self.subscribers.get_mut(routing_key) else {
            tracing::warn!(routing_key, "no subscribers for routing key, message dropped");
            return Ok(());
        };

        entry.retain(|tx| tx.send(payload.to_vec()).is_ok());

        if entry.is_empty() {
            tracing::warn!(routing_key, "all subscribers gone, message dropped");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettlementPublisher for InProcessBus {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), BusError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| BusError::Serialization(e.to_string()))?;
        self.publish_raw(event.routing_key(), &payload)
    }
}
