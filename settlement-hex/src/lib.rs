//! # Settlement Hex
//!
//! Application service layer, in-process message bus, and HTTP adapter for
//! the settlement subsystem.
//!
//! ## Architecture
//!
//! - `service/` - Application services (vault, authorization, broker,
//!   resolver, consumers, schedulers)
//! - `bus` - In-process topic bus carrying serialized settlement messages
//! - `notify` - Live buyer notification channels
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! Services hold their ports as `Arc<dyn Trait>`, injected at startup by the
//! application binary.

pub mod bus;
pub mod inbound;
pub mod notify;
pub mod openapi;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use bus::InProcessBus;
pub use notify::BuyerChannels;
pub use service::{
    CredentialVault, DelegatedAuthManager, PaymentSessionBroker, SessionRequestListener,
    SettlementConsumer, StaleRecordReaper, TokenRefreshScheduler, WebhookResolver,
};
