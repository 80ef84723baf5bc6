//! Settlement message bus port.

use crate::domain::SettlementEvent;

/// Routing key for inbound payment-session requests from domain services.
/// Settlement events use the per-service keys from
/// [`crate::domain::ServiceType::routing_key`].
pub const PAYMENT_REQUESTED_KEY: &str = "payment.requested";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Bus unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget publication of settlement events, routed by the event's
/// service type. Delivery is at-least-once; consumers are responsible for
/// idempotent application.
#[async_trait::async_trait]
pub trait SettlementPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), BusError>;
}
