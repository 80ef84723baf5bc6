//! External payment provider and peer service ports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BuyerId, SellerId, ServiceType, SessionRequest};

/// Error type for outbound provider and peer-service calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The call never produced a provider response (DNS, TLS, timeout).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected provider payload: {0}")]
    Payload(String),
}

impl ProviderError {
    /// True when the provider explicitly refused the credential material
    /// (as opposed to a transient transport problem).
    pub fn is_denied(&self) -> bool {
        matches!(self, ProviderError::Api { status, .. } if *status == 400 || *status == 401)
    }
}

/// Token set returned by the provider's token endpoint, for both the
/// authorization-code exchange and the refresh grant.
#[derive(Clone)]
pub struct TokenGrant {
    pub provider_user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub public_key: String,
    pub live_mode: bool,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("provider_user_id", &self.provider_user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("public_key", &"<redacted>")
            .field("live_mode", &self.live_mode)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Metadata this subsystem attaches to every session and reads back from the
/// authoritative payment record. Without it a webhook cannot be attributed
/// to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub service_type: ServiceType,
}

/// The authoritative payment record fetched from the provider after a
/// webhook notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    /// Provider-raw status string; mapped to the canonical status by the
    /// webhook resolver.
    pub status: String,
    pub external_reference: Option<String>,
    /// Raw metadata object as returned by the provider. May be absent, empty,
    /// or shaped by some other system; decoded leniently via
    /// [`PaymentRecord::parsed_metadata`].
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PaymentRecord {
    /// The settlement metadata this subsystem attached at session creation,
    /// if present and well-formed. Anything else means the payment cannot be
    /// attributed to a transaction.
    pub fn parsed_metadata(&self) -> Option<PaymentMetadata> {
        self.metadata
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

/// Outbound port to the external payment provider.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Exchanges an authorization code for a full token grant.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Redeems a refresh token for a new grant. 400/401 from the provider
    /// means the refresh token itself was revoked.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// Lightweight authenticated identity probe. Returns `false` on 401/403
    /// AND on any transport failure - callers treat `false` as "do not
    /// proceed", never as "definitely revoked".
    async fn probe_identity(&self, access_token: &str) -> bool;

    /// Creates a time-boxed payment session on the seller's behalf and
    /// returns the redirect URL the buyer pays at.
    async fn create_session(
        &self,
        access_token: &str,
        request: &SessionRequest,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
    ) -> Result<String, ProviderError>;

    /// Fetches the authoritative payment record for a webhook notification.
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, ProviderError>;
}

/// Peer-service lookup resolving a seller's email to their internal user id.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn user_id_by_email(&self, email: &str) -> Result<Option<SellerId>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_grant_debug_redacts_secrets() {
        let grant = TokenGrant {
            provider_user_id: "12345".into(),
            access_token: "APP_USR-secret".into(),
            refresh_token: "TG-secret".into(),
            public_key: "APP_PUB-key".into(),
            live_mode: false,
            expires_at: Utc::now(),
        };
        let rendered = format!("{:?}", grant);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_parsed_metadata_tolerates_foreign_shapes() {
        let record: PaymentRecord = serde_json::from_str(
            r#"{"id":"1","status":"approved","external_reference":null,"metadata":{}}"#,
        )
        .unwrap();
        assert!(record.parsed_metadata().is_none());

        let record: PaymentRecord =
            serde_json::from_str(r#"{"id":"2","status":"approved"}"#).unwrap();
        assert!(record.parsed_metadata().is_none());
    }

    #[test]
    fn test_parsed_metadata_extracts_attribution() {
        let buyer = BuyerId::new();
        let seller = SellerId::new();
        let raw = format!(
            r#"{{"id":"3","status":"approved","metadata":{{"buyer_id":"{}","seller_id":"{}","service_type":"LODGING"}}}}"#,
            buyer, seller
        );
        let record: PaymentRecord = serde_json::from_str(&raw).unwrap();
        let metadata = record.parsed_metadata().unwrap();
        assert_eq!(metadata.buyer_id, buyer);
        assert_eq!(metadata.seller_id, seller);
        assert_eq!(metadata.service_type, ServiceType::Lodging);
    }

    #[test]
    fn test_denied_detection() {
        assert!(ProviderError::Api {
            status: 401,
            message: "invalid_grant".into()
        }
        .is_denied());
        assert!(!ProviderError::Api {
            status: 500,
            message: "oops".into()
        }
        .is_denied());
        assert!(!ProviderError::Transport("timeout".into()).is_denied());
    }
}
