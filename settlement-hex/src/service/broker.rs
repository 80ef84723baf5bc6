//! Payment session broker.
//!
//! Turns an approved session request into a time-boxed checkout session on
//! the external provider, on the seller's behalf.

use std::sync::Arc;

use chrono::{Duration, Utc};

use settlement_types::{PaymentProvider, RepoError, SessionRequest, SettlementError};

use super::authorization::DelegatedAuthManager;

/// Creates provider checkout sessions using the seller's delegated
/// credential.
#[derive(Clone)]
pub struct PaymentSessionBroker {
    auth: DelegatedAuthManager,
    provider: Arc<dyn PaymentProvider>,
    /// Validity window of every session, from creation time.
    session_window: Duration,
}

impl PaymentSessionBroker {
    pub fn new(
        auth: DelegatedAuthManager,
        provider: Arc<dyn PaymentProvider>,
        session_window: Duration,
    ) -> Self {
        Self {
            auth,
            provider,
            session_window,
        }
    }

    /// Creates a checkout session for `request` and returns the URL the
    /// buyer pays at.
    ///
    /// The seller's token is probed first; a dead token is a hard stop, since
    /// a session minted against it could never settle. The session is valid
    /// from now until the configured window elapses.
    pub async fn create_session(&self, request: &SessionRequest) -> Result<String, SettlementError> {
        let seller_id = request.seller_id;

        let token = match self.auth.valid_access_token(seller_id).await {
            Ok(token) => token,
            Err(SettlementError::CredentialNotFound(id)) => {
                return Err(SettlementError::CredentialNotFound(id));
            }
            Err(SettlementError::Repo(RepoError::Database(msg))) => {
                return Err(SettlementError::CredentialUnavailable(msg));
            }
            Err(e) => return Err(e),
        };

        if !self.provider.probe_identity(&token).await {
            tracing::warn!(%seller_id, transaction_id = %request.transaction_id,
                "liveness probe failed, refusing to create session");
            return Err(SettlementError::AccessTokenRevoked(seller_id));
        }

        let valid_from = Utc::now();
        let valid_to = valid_from + self.session_window;

        let url = self
            .provider
            .create_session(&token, request, valid_from, valid_to)
            .await?;

        tracing::info!(transaction_id = %request.transaction_id, %seller_id,
            valid_to = %valid_to, "payment session created");
        Ok(url)
    }
}
