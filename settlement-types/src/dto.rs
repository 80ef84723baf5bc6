//! Data Transfer Objects for the HTTP boundary.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the provider's webhook callback.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookNotification {
    /// Notification category. Only `"payment"` is processed; every other
    /// type is acknowledged and ignored.
    #[serde(rename = "type")]
    #[schema(example = "payment")]
    pub notification_type: String,
    /// Provider action verb (`payment.created`, `payment.updated`, ...).
    /// Informational only.
    #[serde(default)]
    pub action: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookData {
    /// Provider-side payment id used to fetch the authoritative record.
    #[schema(example = "123456789")]
    pub id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for issuing a seller authorization URL.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AuthorizeParams {
    /// Seller account email, resolved to an internal user id.
    pub email: String,
}

/// Response carrying the provider authorization URL the seller must visit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationUrlResponse {
    #[schema(example = "https://provider.example/authorization?client_id=...&state=...")]
    pub authorization_url: String,
}

/// Query parameters of the provider's redirect back to us.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}
