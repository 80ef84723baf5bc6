//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use settlement_repo::verify_webhook_signature;
use settlement_types::{
    AppError, AuthorizationUrlResponse, AuthorizeParams, BuyerId, CallbackParams,
    WebhookNotification,
};

use crate::notify::BuyerChannels;
use crate::service::{DelegatedAuthManager, WebhookResolver};

/// Renders the provider authorization URL for a freshly minted state. Kept
/// as a closure so the HTTP layer never sees the provider client's URL
/// format.
pub type AuthorizeUrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Application state shared across handlers.
pub struct AppState {
    pub auth: DelegatedAuthManager,
    pub resolver: WebhookResolver,
    pub channels: Arc<BuyerChannels>,
    pub authorize_url: AuthorizeUrlBuilder,
    /// Shared secret for webhook signature verification. `None` disables the
    /// check (local development against a provider sandbox).
    pub webhook_secret: Option<String>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<settlement_types::SettlementError> for ApiError {
    fn from(err: settlement_types::SettlementError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Issues a provider authorization URL for a seller.
#[tracing::instrument(skip(state), fields(email = %params.email))]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let build = state.authorize_url.clone();
    let authorization_url = state
        .auth
        .build_authorization_url(&params.email, |s| build(s))
        .await?;

    Ok(Json(AuthorizationUrlResponse { authorization_url }))
}

/// Provider redirect target completing the authorization handshake.
#[tracing::instrument(skip(state, params))]
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let seller_id = state.auth.exchange_code(&params.code, &params.state).await?;

    Ok(Json(serde_json::json!({
        "seller_id": seller_id,
        "status": "authorized"
    })))
}

/// Provider webhook callback.
///
/// Acknowledges immediately and resolves the notification in the background;
/// the provider's delivery timeout must never depend on our provider
/// round-trips.
#[tracing::instrument(skip_all)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get("x-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !verify_webhook_signature(&body, signature, secret) {
            tracing::warn!("webhook signature verification failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let notification: WebhookNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let resolver = state.resolver.clone();
    tokio::spawn(async move {
        resolver.handle(notification).await;
    });

    StatusCode::OK.into_response()
}

/// Upgrades to the buyer's live notification connection.
#[tracing::instrument(skip(state, ws))]
pub async fn buyer_socket(
    State(state): State<Arc<AppState>>,
    Path(buyer_id): Path<BuyerId>,
    ws: WebSocketUpgrade,
) -> Response {
    let channels = state.channels.clone();
    ws.on_upgrade(move |socket| serve_buyer_socket(socket, channels, buyer_id))
}

/// Pumps notifications to one buyer connection until either side closes.
async fn serve_buyer_socket(mut socket: WebSocket, channels: Arc<BuyerChannels>, buyer_id: BuyerId) {
    let mut notifications = channels.register(buyer_id);
    tracing::debug!(%buyer_id, "buyer connected");

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                // A closed receiver means a newer connection replaced this one.
                let Some(notification) = notification else { break };

                let text = match serde_json::to_string(&notification) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(%buyer_id, error = %e, "failed to encode notification");
                        continue;
                    }
                };

                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames from buyers carry nothing we act on.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(notifications);
    channels.unregister(buyer_id);
    tracing::debug!(%buyer_id, "buyer disconnected");
}
