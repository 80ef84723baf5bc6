//! # Settlement Types
//!
//! Domain types and port traits for the payment settlement subsystem.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (ids, Money, Credential, SettlementEvent)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for the HTTP boundary
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    AuthorizationState, BuyerId, Credential, Currency, Money, PaymentProgress, PlainCredential,
    SellerId, ServiceType, SessionRequest, SettlementEvent, SettlementStatus, TransactionId,
};
pub use dto::*;
pub use error::{AppError, RepoError, SettlementError};
pub use ports::{
    AuthStateStore, BusError, BuyerNotification, BuyerNotifier, CredentialStore, PaymentMetadata,
    PaymentProvider, PaymentRecord, ProviderError, SettlementPublisher, SettlementTarget,
    TokenGrant, UserDirectory, PAYMENT_REQUESTED_KEY,
};
