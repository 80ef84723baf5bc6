//! Settlement events and canonical statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BuyerId, SellerId, TransactionId};

/// The domain a transaction settles against. Selects the routing key on the
/// settlement bus and therefore the consumer that applies the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Gastronomy,
    Lodging,
}

impl ServiceType {
    /// Routing key for settlement events of this service type.
    pub fn routing_key(&self) -> &'static str {
        match self {
            ServiceType::Gastronomy => "settlement.gastronomy",
            ServiceType::Lodging => "settlement.lodging",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::Gastronomy => write!(f, "GASTRONOMY"),
            ServiceType::Lodging => write!(f, "LODGING"),
        }
    }
}

/// This system's normalized settlement outcome, decoupled from the external
/// provider's raw status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Paid,
    Rejected,
    Unknown,
}

impl SettlementStatus {
    /// Maps the provider's raw status string to the canonical status.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "approved" => SettlementStatus::Paid,
            "rejected" => SettlementStatus::Rejected,
            "pending" | "in_process" => SettlementStatus::Pending,
            _ => SettlementStatus::Unknown,
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => write!(f, "PENDING"),
            SettlementStatus::Paid => write!(f, "PAID"),
            SettlementStatus::Rejected => write!(f, "REJECTED"),
            SettlementStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Canonical view of a domain entity's payment state as exposed through the
/// [`crate::ports::SettlementTarget`] port. Orders map `PENDING`/`PAID`/
/// `FAILED` onto it directly; reservations have no failed state and only ever
/// report `Pending` or `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProgress {
    Pending,
    Paid,
    Failed,
}

impl PaymentProgress {
    /// True once a terminal status has been applied. Terminal states are
    /// never overwritten by later events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentProgress::Paid | PaymentProgress::Failed)
    }
}

/// A message describing either session creation or a resolved payment
/// outcome, routed by service type. Immutable after publication; delivered
/// at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementEvent {
    SessionCreated {
        transaction_id: TransactionId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        service_type: ServiceType,
        session_url: String,
        occurred_at: DateTime<Utc>,
    },
    Webhook {
        transaction_id: TransactionId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        service_type: ServiceType,
        status: SettlementStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl SettlementEvent {
    pub fn service_type(&self) -> ServiceType {
        match self {
            SettlementEvent::SessionCreated { service_type, .. }
            | SettlementEvent::Webhook { service_type, .. } => *service_type,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        match self {
            SettlementEvent::SessionCreated { transaction_id, .. }
            | SettlementEvent::Webhook { transaction_id, .. } => *transaction_id,
        }
    }

    /// Routing key the event travels under on the bus.
    pub fn routing_key(&self) -> &'static str {
        self.service_type().routing_key()
    }
}
