//! Delegated payment credentials and the authorization handshake state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SellerId;

/// A seller's delegated-authorization credential as persisted by the vault.
///
/// All token material is held as ciphertext; plaintext secrets exist only in
/// [`PlainCredential`] at the point of use. One row per seller, superseded in
/// place on refresh or re-authorization, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub seller_id: SellerId,
    pub access_token_cipher: String,
    pub refresh_token_cipher: String,
    pub public_key_cipher: String,
    /// The seller's account id on the external provider's side.
    pub provider_user_id: String,
    pub live_mode: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted credential material, produced only by the vault and consumed
/// only by the authorization manager. Secrets are redacted from `Debug`
/// output so they cannot leak through logs.
#[derive(Clone)]
pub struct PlainCredential {
    pub seller_id: SellerId,
    pub access_token: String,
    pub refresh_token: String,
    pub public_key: String,
    pub live_mode: bool,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for PlainCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainCredential")
            .field("seller_id", &self.seller_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("public_key", &"<redacted>")
            .field("live_mode", &self.live_mode)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Ephemeral correlator for the authorization-code handshake.
///
/// Created when an authorization URL is issued and consumed exactly once when
/// the provider redirects back with a matching `state`. Orphaned rows are
/// reaped after a short window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Opaque single-use token embedded in the authorization URL.
    pub state: String,
    pub seller_user_id: SellerId,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationState {
    pub fn new(state: String, seller_user_id: SellerId) -> Self {
        Self {
            state,
            seller_user_id,
            created_at: Utc::now(),
        }
    }
}
