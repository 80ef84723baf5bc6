//! Transient payment session request.

use serde::{Deserialize, Serialize};

use super::ids::{BuyerId, SellerId, TransactionId};
use super::money::Money;
use super::settlement::ServiceType;

/// A request for a time-boxed payment session.
///
/// Not persisted by this subsystem: it arrives on the bus from the owning
/// domain service, is handed to the provider, and only the resulting session
/// URL survives (inside a `SESSION_CREATED` event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub transaction_id: TransactionId,
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub service_type: ServiceType,
    pub amount: Money,
}
