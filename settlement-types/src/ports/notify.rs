//! Buyer notification port.

use serde::{Deserialize, Serialize};

use crate::domain::{BuyerId, SettlementStatus, TransactionId};

/// Payload pushed to a buyer's live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuyerNotification {
    /// The payment page is ready; the buyer should follow `url`.
    SessionUrl {
        transaction_id: TransactionId,
        url: String,
    },
    /// The settlement outcome for a transaction changed.
    Status {
        transaction_id: TransactionId,
        status: SettlementStatus,
    },
    /// No payment session could be created; the buyer must not be left
    /// waiting on a URL that will never arrive.
    PaymentUnavailable { transaction_id: TransactionId },
}

/// Delivery to the one live connection addressed to `buyer_id` - never a
/// broadcast. An absent connection means the push is simply undelivered;
/// the domain entity's status remains the durable record of truth, so
/// `push` returns nothing.
#[async_trait::async_trait]
pub trait BuyerNotifier: Send + Sync + 'static {
    async fn push(&self, buyer_id: BuyerId, notification: BuyerNotification);
}
