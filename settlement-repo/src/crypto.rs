//! Secret cipher for credentials at rest and webhook signature checks.
//!
//! Token material is encrypted with ChaCha20Poly1305 (AEAD) under a single
//! process-wide key before it reaches storage; each field gets its own random
//! 12-byte nonce and is stored as base64(`nonce || ciphertext`). Webhook
//! signatures are HMAC-SHA256 over the raw request body, compared in
//! constant time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use settlement_types::RepoError;

/// ChaCha20Poly1305 nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// Symmetric cipher guarding credential fields at rest.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: ChaCha20Poly1305,
}

impl SecretCipher {
    /// Builds a cipher from a 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new_from_slice(&key)
                .expect("32-byte key is always a valid ChaCha20Poly1305 key"),
        }
    }

    /// Builds a cipher from a 64-character hex key, the form the key takes
    /// in configuration.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, RepoError> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| RepoError::Crypto(format!("invalid encryption key hex: {}", e)))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RepoError::Crypto("encryption key must be 32 bytes".into()))?;
        Ok(Self::new(key))
    }

    /// Encrypts a plaintext secret to base64(`nonce || ciphertext`).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, RepoError> {
        let nonce_bytes: [u8; NONCE_SIZE] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| RepoError::Crypto(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypts a value produced by [`SecretCipher::encrypt`]. Fails on any
    /// tampering; the AEAD tag covers the whole ciphertext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, RepoError> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|e| RepoError::Crypto(format!("invalid ciphertext encoding: {}", e)))?;

        if blob.len() < NONCE_SIZE {
            return Err(RepoError::Crypto("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| RepoError::Crypto("decryption failed".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| RepoError::Crypto("decrypted secret is not valid UTF-8".into()))
    }
}

/// Signs a webhook payload using HMAC-SHA256.
pub fn sign_webhook(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a webhook signature using constant-time comparison.
pub fn verify_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_webhook(payload, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
