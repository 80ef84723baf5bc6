//! Error types for the settlement subsystem.

use crate::domain::SellerId;
use crate::ports::ProviderError;

/// Settlement-level errors (business outcomes of the credential, session,
/// and webhook flows).
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The seller has never completed the authorization handshake.
    #[error("No credential stored for seller {0}")]
    CredentialNotFound(SellerId),

    /// Transient failure resolving a credential; the caller may retry.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// The liveness probe failed. Hard stop for session creation: a session
    /// created against a revoked token would be unusable by the seller.
    #[error("Access token revoked for seller {0}")]
    AccessTokenRevoked(SellerId),

    /// The provider rejected the refresh token. Terminal for this seller
    /// until they re-authorize.
    #[error("Refresh token revoked for seller {0}")]
    RefreshTokenRevoked(SellerId),

    /// The authorization `state` is absent or was already consumed.
    #[error("Unknown or already consumed authorization state")]
    UnknownState,

    #[error("No user registered for email {0}")]
    UserNotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::UnknownState => {
                AppError::BadRequest("Unknown or already consumed authorization state".into())
            }
            SettlementError::UserNotFound(email) => {
                AppError::NotFound(format!("No user registered for email {}", email))
            }
            SettlementError::CredentialNotFound(seller) => {
                AppError::NotFound(format!("No credential stored for seller {}", seller))
            }
            SettlementError::CredentialUnavailable(msg) => AppError::Unavailable(msg),
            SettlementError::Provider(e) => AppError::Unavailable(e.to_string()),
            SettlementError::AccessTokenRevoked(_) | SettlementError::RefreshTokenRevoked(_) => {
                AppError::BadRequest(err.to_string())
            }
            SettlementError::Repo(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
            RepoError::Crypto(e) => AppError::Internal(e),
        }
    }
}
