//! Application services.
//!
//! Pure orchestration over the ports in `settlement-types`; no HTTP or SQL
//! in here. Services hold their ports as `Arc<dyn Trait>` so one instance
//! can be shared between the HTTP state and the background tasks.

mod authorization;
mod broker;
mod consumer;
mod listener;
mod scheduler;
mod vault;
mod webhook;

pub use authorization::DelegatedAuthManager;
pub use broker::PaymentSessionBroker;
pub use consumer::SettlementConsumer;
pub use listener::SessionRequestListener;
pub use scheduler::{StaleRecordReaper, TokenRefreshScheduler};
pub use vault::CredentialVault;
pub use webhook::WebhookResolver;
