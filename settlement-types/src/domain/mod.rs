//! Pure domain types. No IO, no framework dependencies.

mod credential;
mod ids;
mod money;
mod session;
mod settlement;

pub use credential::{AuthorizationState, Credential, PlainCredential};
pub use ids::{BuyerId, SellerId, TransactionId};
pub use money::{Currency, Money};
pub use session::SessionRequest;
pub use settlement::{PaymentProgress, ServiceType, SettlementEvent, SettlementStatus};
