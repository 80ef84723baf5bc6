//! Port traits for the hexagonal architecture.
//!
//! Adapters (sqlx stores, the reqwest provider client, the in-process bus,
//! the WebSocket channel registry) implement these traits. Services hold them
//! as `Arc<dyn ...>` so a single adapter instance can be shared across the
//! HTTP handlers, the bus consumers, and the background schedulers.

mod bus;
mod notify;
mod provider;
mod stores;

pub use bus::{BusError, SettlementPublisher, PAYMENT_REQUESTED_KEY};
pub use notify::{BuyerNotification, BuyerNotifier};
pub use provider::{
    PaymentMetadata, PaymentProvider, PaymentRecord, ProviderError, TokenGrant, UserDirectory,
};
pub use stores::{AuthStateStore, CredentialStore, SettlementTarget};
