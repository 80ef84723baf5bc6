//! Database row types and conversions to domain types.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use settlement_types::{AuthorizationState, Credential, PaymentProgress, RepoError, SellerId};

/// Renders a timestamp as a fixed-width RFC 3339 string (UTC, microseconds)
/// so string comparison in SQL matches chronological order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("invalid timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(raw).map_err(|e| RepoError::Database(format!("invalid uuid '{}': {}", raw, e)))
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbCredential {
    pub seller_id: String,
    pub access_token_cipher: String,
    pub refresh_token_cipher: String,
    pub public_key_cipher: String,
    pub provider_user_id: String,
    pub live_mode: i32,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DbCredential {
    pub fn into_domain(self) -> Result<Credential, RepoError> {
        Ok(Credential {
            seller_id: SellerId::from_uuid(parse_uuid(&self.seller_id)?),
            access_token_cipher: self.access_token_cipher,
            refresh_token_cipher: self.refresh_token_cipher,
            public_key_cipher: self.public_key_cipher,
            provider_user_id: self.provider_user_id,
            live_mode: self.live_mode != 0,
            expires_at: parse_ts(&self.expires_at)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DbAuthorizationState {
    pub state: String,
    pub seller_user_id: String,
    pub created_at: String,
}

impl DbAuthorizationState {
    pub fn into_domain(self) -> Result<AuthorizationState, RepoError> {
        Ok(AuthorizationState {
            state: self.state,
            seller_user_id: SellerId::from_uuid(parse_uuid(&self.seller_user_id)?),
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// Order status column values.
pub(crate) mod order_status {
    pub const PENDING: &str = "PENDING";
    pub const PAID: &str = "PAID";
    pub const FAILED: &str = "FAILED";
}

/// Reservation payment_status column values.
pub(crate) mod reservation_status {
    pub const UNPAID: &str = "unpaid";
    pub const PARTIALLY_PAID: &str = "partially_paid";
    pub const PAID: &str = "paid";
}

pub(crate) fn order_progress(status: &str) -> Result<PaymentProgress, RepoError> {
    match status {
        order_status::PENDING => Ok(PaymentProgress::Pending),
        order_status::PAID => Ok(PaymentProgress::Paid),
        order_status::FAILED => Ok(PaymentProgress::Failed),
        other => Err(RepoError::Database(format!(
            "unexpected order status '{}'",
            other
        ))),
    }
}

pub(crate) fn reservation_progress(status: &str) -> Result<PaymentProgress, RepoError> {
    match status {
        // A partially paid reservation still awaits settlement of the rest.
        reservation_status::UNPAID | reservation_status::PARTIALLY_PAID => {
            Ok(PaymentProgress::Pending)
        }
        reservation_status::PAID => Ok(PaymentProgress::Paid),
        other => Err(RepoError::Database(format!(
            "unexpected reservation payment status '{}'",
            other
        ))),
    }
}
