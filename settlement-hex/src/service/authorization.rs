//! Delegated authorization manager.
//!
//! Owns the authorization-code handshake with the external provider and the
//! lifecycle of the resulting credentials: issuing authorization URLs,
//! redeeming callback codes, refreshing grants, and probing token liveness.

use std::sync::Arc;

use rand::Rng;

use settlement_types::{
    AuthStateStore, AuthorizationState, PaymentProvider, SellerId, SettlementError, UserDirectory,
};

use super::vault::CredentialVault;

/// Length in bytes of the random `state` correlator (hex-encoded on the wire).
const STATE_BYTES: usize = 32;

#[derive(Clone)]
pub struct DelegatedAuthManager {
    vault: CredentialVault,
    states: Arc<dyn AuthStateStore>,
    provider: Arc<dyn PaymentProvider>,
    directory: Arc<dyn UserDirectory>,
}

impl DelegatedAuthManager {
    pub fn new(
        vault: CredentialVault,
        states: Arc<dyn AuthStateStore>,
        provider: Arc<dyn PaymentProvider>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            vault,
            states,
            provider,
            directory,
        }
    }

    /// Issues a provider authorization URL for the seller registered under
    /// `email`, minting and persisting a fresh single-use `state`.
    ///
    /// `build_url` renders the final URL so the provider client keeps
    /// ownership of its own URL format.
    pub async fn build_authorization_url<F>(
        &self,
        email: &str,
        build_url: F,
    ) -> Result<String, SettlementError>
    where
        F: FnOnce(&str) -> String,
    {
        let seller_id = self
            .directory
            .user_id_by_email(email)
            .await?
            .ok_or_else(|| SettlementError::UserNotFound(email.to_string()))?;

        let state = mint_state();
        self.states
            .insert(&AuthorizationState::new(state.clone(), seller_id))
            .await?;

        Ok(build_url(&state))
    }

    /// Redeems the provider's callback. The `state` is consumed atomically,
    /// so a replayed callback fails with [`SettlementError::UnknownState`]
    /// before any provider call is made.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<SellerId, SettlementError> {
        let auth_state = self
            .states
            .consume(state)
            .await?
            .ok_or(SettlementError::UnknownState)?;

        let grant = self.provider.exchange_code(code).await?;
        let seller_id = auth_state.seller_user_id;

        self.vault.store(seller_id, &grant).await?;

        tracing::info!(%seller_id, "seller authorization completed");
        Ok(seller_id)
    }

    /// Decrypted access token for a seller, or the precise reason none is
    /// usable.
    pub async fn valid_access_token(&self, seller_id: SellerId) -> Result<String, SettlementError> {
        let plain = self
            .vault
            .reveal(seller_id)
            .await?
            .ok_or(SettlementError::CredentialNotFound(seller_id))?;

        Ok(plain.access_token)
    }

    /// Probes whether a seller's stored access token is still honored by the
    /// provider. `false` also covers transport failures: the caller must not
    /// proceed either way.
    pub async fn is_token_valid(&self, seller_id: SellerId) -> Result<bool, SettlementError> {
        let token = self.valid_access_token(seller_id).await?;
        Ok(self.provider.probe_identity(&token).await)
    }

    /// Redeems the seller's refresh token for a fresh grant and stores it.
    ///
    /// A provider denial means the refresh token itself was revoked; that is
    /// terminal for this seller until they re-authorize. Any other failure is
    /// transient and surfaces as-is.
    pub async fn refresh(&self, seller_id: SellerId) -> Result<(), SettlementError> {
        let plain = self
            .vault
            .reveal(seller_id)
            .await?
            .ok_or(SettlementError::CredentialNotFound(seller_id))?;

        let grant = match self.provider.refresh_grant(&plain.refresh_token).await {
            Ok(grant) => grant,
            Err(e) if e.is_denied() => {
                tracing::warn!(%seller_id, "refresh token revoked by provider");
                return Err(SettlementError::RefreshTokenRevoked(seller_id));
            }
            Err(e) => return Err(e.into()),
        };

        self.vault.store(seller_id, &grant).await?;
        tracing::info!(%seller_id, expires_at = %grant.expires_at, "credential refreshed");
        Ok(())
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }
}

/// Mints a cryptographically random hex `state` correlator.
fn mint_state() -> String {
    let bytes: [u8; STATE_BYTES] = rand::rng().random();
    hex::encode(bytes)
}
