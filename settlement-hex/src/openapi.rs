//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use settlement_types::dto::{
    AuthorizationUrlResponse, AuthorizeParams, CallbackParams, WebhookData, WebhookNotification,
};
use settlement_types::{ServiceType, SettlementStatus};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Issue a provider authorization URL for a seller
#[utoipa::path(
    get,
    path = "/oauth/authorize",
    tag = "authorization",
    params(AuthorizeParams),
    responses(
        (status = 200, description = "Authorization URL issued", body = AuthorizationUrlResponse),
        (status = 404, description = "No user registered for that email")
    )
)]
async fn authorize() {}

/// Provider redirect completing the authorization handshake
#[utoipa::path(
    get,
    path = "/oauth/callback",
    tag = "authorization",
    params(CallbackParams),
    responses(
        (status = 200, description = "Seller credentials stored"),
        (status = 400, description = "Unknown or already consumed state")
    )
)]
async fn oauth_callback() {}

/// Provider webhook callback
#[utoipa::path(
    post,
    path = "/webhook",
    tag = "webhooks",
    request_body = WebhookNotification,
    responses(
        (status = 200, description = "Notification acknowledged; resolution happens asynchronously"),
        (status = 401, description = "Signature verification failed")
    )
)]
async fn webhook() {}

/// Buyer live notification socket
#[utoipa::path(
    get,
    path = "/ws/{buyer_id}",
    tag = "notifications",
    params(("buyer_id" = uuid::Uuid, Path, description = "Buyer to receive notifications for")),
    responses(
        (status = 101, description = "Switching to WebSocket")
    )
)]
async fn buyer_socket() {}

#[derive(OpenApi)]
#[openapi(
    paths(health, authorize, oauth_callback, webhook, buyer_socket),
    components(schemas(
        AuthorizationUrlResponse,
        WebhookNotification,
        WebhookData,
        ServiceType,
        SettlementStatus,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "authorization", description = "Seller authorization handshake"),
        (name = "webhooks", description = "Provider payment notifications"),
        (name = "notifications", description = "Buyer live updates"),
    ),
    info(
        title = "Settlement Service API",
        description = "Cross-service payment settlement subsystem",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
