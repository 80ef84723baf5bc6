//! Credential vault.
//!
//! The only component that touches token ciphertext. Grants go in as
//! plaintext exactly once, are encrypted field by field, and come back out
//! only as [`PlainCredential`] at the point of use.

use std::sync::Arc;

use chrono::Utc;

use settlement_repo::SecretCipher;
use settlement_types::{
    Credential, CredentialStore, PlainCredential, RepoError, SellerId, TokenGrant,
};

/// Encrypted per-seller credential storage.
#[derive(Clone)]
pub struct CredentialVault {
    credentials: Arc<dyn CredentialStore>,
    cipher: SecretCipher,
}

impl CredentialVault {
    pub fn new(credentials: Arc<dyn CredentialStore>, cipher: SecretCipher) -> Self {
        Self {
            credentials,
            cipher,
        }
    }

    /// Encrypts a token grant and persists it, superseding any existing
    /// credential for the seller in place.
    pub async fn store(&self, seller_id: SellerId, grant: &TokenGrant) -> Result<(), RepoError> {
        let existing = self.credentials.find(seller_id).await?;
        let now = Utc::now();

        let credential = Credential {
            seller_id,
            access_token_cipher: self.cipher.encrypt(&grant.access_token)?,
            refresh_token_cipher: self.cipher.encrypt(&grant.refresh_token)?,
            public_key_cipher: self.cipher.encrypt(&grant.public_key)?,
            provider_user_id: grant.provider_user_id.clone(),
            live_mode: grant.live_mode,
            expires_at: grant.expires_at,
            created_at: existing.map(|c| c.created_at).unwrap_or(now),
            updated_at: now,
        };

        self.credentials.upsert(&credential).await
    }

    /// Encrypted credential row for a seller, without decrypting anything.
    pub async fn get(&self, seller_id: SellerId) -> Result<Option<Credential>, RepoError> {
        self.credentials.find(seller_id).await
    }

    /// Decrypts a seller's credential for immediate use.
    pub async fn reveal(&self, seller_id: SellerId) -> Result<Option<PlainCredential>, RepoError> {
        let Some(credential) = self.credentials.find(seller_id).await? else {
            return Ok(None);
        };

        Ok(Some(PlainCredential {
            seller_id,
            access_token: self.cipher.decrypt(&credential.access_token_cipher)?,
            refresh_token: self.cipher.decrypt(&credential.refresh_token_cipher)?,
            public_key: self.cipher.decrypt(&credential.public_key_cipher)?,
            live_mode: credential.live_mode,
            expires_at: credential.expires_at,
        }))
    }

    /// Credentials whose access token expires at or before `until`.
    pub async fn expiring_within(
        &self,
        until: chrono::DateTime<Utc>,
    ) -> Result<Vec<Credential>, RepoError> {
        self.credentials.expiring_within(until).await
    }
}
