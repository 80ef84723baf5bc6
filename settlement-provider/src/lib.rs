//! # Settlement Provider Clients
//!
//! Typed reqwest adapters for the external payment provider (token exchange,
//! refresh, identity probe, session creation, payment lookup) and the peer
//! user-directory service. The provider is an opaque remote authority; these
//! clients translate its wire format into the domain types and nothing else.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use settlement_types::{
    PaymentMetadata, PaymentProvider, PaymentRecord, ProviderError, SellerId, SessionRequest,
    TokenGrant, UserDirectory,
};

/// Connection settings for the external payment provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the provider, embedded in every
    /// authorization URL and token exchange.
    pub redirect_uri: String,
    /// Platform-level token used for payment lookups. Seller tokens only
    /// authorize session creation and the identity probe.
    pub platform_token: String,
    /// Where the provider should deliver webhook notifications.
    pub notification_url: String,
}

/// Client for the external payment provider's HTTP API.
pub struct ProviderClient {
    config: ProviderConfig,
    http: Client,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    public_key: String,
    #[serde(default)]
    live_mode: bool,
    user_id: i64,
    /// Seconds until the access token expires.
    expires_in: i64,
}

impl TokenResponse {
    fn into_grant(self) -> TokenGrant {
        TokenGrant {
            provider_user_id: self.user_id.to_string(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            public_key: self.public_key,
            live_mode: self.live_mode,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    /// Redirect URL the buyer completes payment at.
    init_point: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    id: SellerId,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// The provider authorization page URL for a seller, with our client id,
    /// the single-use `state`, and the registered redirect URI embedded.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/authorization?client_id={}&response_type=code&state={}&redirect_uri={}",
            self.config.base_url, self.config.client_id, state, self.config.redirect_uri
        )
    }

    async fn token_request(
        &self,
        body: serde_json::Value,
    ) -> Result<TokenGrant, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/oauth/token", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let response: TokenResponse = handle_response(resp).await?;
        Ok(response.into_grant())
    }
}

#[async_trait::async_trait]
impl PaymentProvider for ProviderClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        self.token_request(serde_json::json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": self.config.redirect_uri,
        }))
        .await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.token_request(serde_json::json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        }))
        .await
    }

    async fn probe_identity(&self, access_token: &str) -> bool {
        let result = self
            .http
            .get(format!("{}/users/me", self.config.base_url))
            .bearer_auth(access_token)
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            // A transport failure is indistinguishable from a revoked token
            // here; callers only need "do not proceed".
            Err(e) => {
                tracing::debug!("identity probe transport failure: {}", e);
                false
            }
        }
    }

    async fn create_session(
        &self,
        access_token: &str,
        request: &SessionRequest,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
    ) -> Result<String, ProviderError> {
        let metadata = PaymentMetadata {
            buyer_id: request.buyer_id,
            seller_id: request.seller_id,
            service_type: request.service_type,
        };

        let body = serde_json::json!({
            "items": [{
                "title": format!("{} payment", request.service_type),
                "quantity": 1,
                "currency_id": request.amount.currency().to_string(),
                "unit_price": request.amount.as_major_units(),
            }],
            "external_reference": request.transaction_id.to_string(),
            "metadata": metadata,
            "expires": true,
            "expiration_date_from": valid_from.to_rfc3339(),
            "expiration_date_to": valid_to.to_rfc3339(),
            "notification_url": self.config.notification_url,
        });

        let resp = self
            .http
            .post(format!("{}/checkout/preferences", self.config.base_url))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let preference: PreferenceResponse = handle_response(resp).await?;
        Ok(preference.init_point)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/v1/payments/{}", self.config.base_url, payment_id))
            .bearer_auth(&self.config.platform_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        handle_response(resp).await
    }
}

/// Client for the peer service that owns user accounts.
pub struct UserDirectoryClient {
    base_url: String,
    http: Client,
}

impl UserDirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for UserDirectoryClient {
    async fn user_id_by_email(&self, email: &str) -> Result<Option<SellerId>, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/api/users/by-email", self.base_url))
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let user: DirectoryUser = handle_response(resp).await?;
        Ok(Some(user.id))
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Payload(e.to_string()))
    } else {
        let message = resp.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            base_url: "https://provider.test".into(),
            client_id: "client-1".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://portal.test/oauth/callback".into(),
            platform_token: "platform-token".into(),
            notification_url: "https://portal.test/webhook".into(),
        }
    }

    #[test]
    fn test_authorization_url_embeds_state_and_redirect() {
        let client = ProviderClient::new(config());
        let url = client.authorization_url("opaque-state-123");
        assert!(url.starts_with("https://provider.test/authorization?"));
        assert!(url.contains("state=opaque-state-123"));
        assert!(url.contains("redirect_uri=https://portal.test/oauth/callback"));
    }

    #[test]
    fn test_token_response_grant_conversion() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","public_key":"p",
                "live_mode":true,"user_id":987654,"expires_in":21600}"#,
        )
        .unwrap();
        let grant = response.into_grant();
        assert_eq!(grant.provider_user_id, "987654");
        assert!(grant.live_mode);
        assert!(grant.expires_at > Utc::now() + Duration::hours(5));
    }

    #[test]
    fn test_directory_trims_trailing_slash() {
        let client = UserDirectoryClient::new("https://users.test/");
        assert_eq!(client.base_url, "https://users.test");
    }
}
