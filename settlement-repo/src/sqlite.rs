//! SQLite repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use settlement_types::{
    AuthStateStore, AuthorizationState, BuyerId, Credential, CredentialStore, PaymentProgress,
    RepoError, SellerId, SettlementTarget, TransactionId,
};

use crate::types::{
    DbAuthorizationState, DbCredential, fmt_ts, order_progress, order_status,
    reservation_progress, reservation_status,
};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;
        tracing::debug!("sqlite schema migration applied");

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Order-table settlement target sharing this repository's pool.
    pub fn orders(&self) -> SqliteOrders {
        SqliteOrders {
            pool: self.pool.clone(),
        }
    }

    /// Reservation-table settlement target sharing this repository's pool.
    pub fn reservations(&self) -> SqliteReservations {
        SqliteReservations {
            pool: self.pool.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CredentialStore for SqliteRepo {
    async fn upsert(&self, credential: &Credential) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO credentials
                   (seller_id, access_token_cipher, refresh_token_cipher, public_key_cipher,
                    provider_user_id, live_mode, expires_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(seller_id) DO UPDATE SET
                   access_token_cipher  = excluded.access_token_cipher,
                   refresh_token_cipher = excluded.refresh_token_cipher,
                   public_key_cipher    = excluded.public_key_cipher,
                   provider_user_id     = excluded.provider_user_id,
                   live_mode            = excluded.live_mode,
                   expires_at           = excluded.expires_at,
                   updated_at           = excluded.updated_at"#,
        )
        .bind(credential.seller_id.to_string())
        .bind(&credential.access_token_cipher)
        .bind(&credential.refresh_token_cipher)
        .bind(&credential.public_key_cipher)
        .bind(&credential.provider_user_id)
        .bind(credential.live_mode as i32)
        .bind(fmt_ts(credential.expires_at))
        .bind(fmt_ts(credential.created_at))
        .bind(fmt_ts(credential.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find(&self, seller_id: SellerId) -> Result<Option<Credential>, RepoError> {
        let row: Option<DbCredential> = sqlx::query_as(
            r#"SELECT seller_id, access_token_cipher, refresh_token_cipher, public_key_cipher,
                      provider_user_id, live_mode, expires_at, created_at, updated_at
               FROM credentials WHERE seller_id = ?"#,
        )
        .bind(seller_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbCredential::into_domain).transpose()
    }

    async fn expiring_within(&self, until: DateTime<Utc>) -> Result<Vec<Credential>, RepoError> {
        let rows: Vec<DbCredential> = sqlx::query_as(
            r#"SELECT seller_id, access_token_cipher, refresh_token_cipher, public_key_cipher,
                      provider_user_id, live_mode, expires_at, created_at, updated_at
               FROM credentials WHERE expires_at <= ? AND refresh_token_cipher <> ''
               ORDER BY expires_at ASC"#,
        )
        .bind(fmt_ts(until))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbCredential::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization-state store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuthStateStore for SqliteRepo {
    async fn insert(&self, state: &AuthorizationState) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO authorization_states (state, seller_user_id, created_at)
               VALUES (?, ?, ?)"#,
        )
        .bind(&state.state)
        .bind(state.seller_user_id.to_string())
        .bind(fmt_ts(state.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict("authorization state already exists".into())
            }
            other => RepoError::Database(other.to_string()),
        })?;

        Ok(())
    }

    async fn consume(&self, state: &str) -> Result<Option<AuthorizationState>, RepoError> {
        // DELETE..RETURNING makes the consume single-use even under
        // concurrent callbacks with the same state.
        let row: Option<DbAuthorizationState> = sqlx::query_as(
            r#"DELETE FROM authorization_states WHERE state = ?
               RETURNING state, seller_user_id, created_at"#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbAuthorizationState::into_domain).transpose()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(r#"DELETE FROM authorization_states WHERE created_at < ?"#)
            .bind(fmt_ts(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settlement targets
// ─────────────────────────────────────────────────────────────────────────────

/// Gastronomy settlement target backed by the orders table.
#[derive(Clone)]
pub struct SqliteOrders {
    pool: SqlitePool,
}

impl SqliteOrders {
    /// Seeds a pending order, the state a checkout session starts from.
    pub async fn insert_pending(
        &self,
        transaction_id: TransactionId,
        buyer_id: BuyerId,
    ) -> Result<(), RepoError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            r#"INSERT INTO orders (transaction_id, buyer_id, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(transaction_id.to_string())
        .bind(buyer_id.to_string())
        .bind(order_status::PENDING)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SettlementTarget for SqliteOrders {
    async fn progress(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentProgress>, RepoError> {
        let status: Option<(String,)> =
            sqlx::query_as(r#"SELECT status FROM orders WHERE transaction_id = ?"#)
                .bind(transaction_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        status.map(|(s,)| order_progress(&s)).transpose()
    }

    async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
        // Guarded update: a terminal row is never overwritten, and an update
        // that touched nothing reports no transition.
        let result = sqlx::query(
            r#"UPDATE orders SET status = ?, updated_at = ?
               WHERE transaction_id = ? AND status = ?"#,
        )
        .bind(order_status::PAID)
        .bind(fmt_ts(Utc::now()))
        .bind(transaction_id.to_string())
        .bind(order_status::PENDING)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE orders SET status = ?, updated_at = ?
               WHERE transaction_id = ? AND status = ?"#,
        )
        .bind(order_status::FAILED)
        .bind(fmt_ts(Utc::now()))
        .bind(transaction_id.to_string())
        .bind(order_status::PENDING)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reap_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result =
            sqlx::query(r#"DELETE FROM orders WHERE status = ? AND created_at < ?"#)
                .bind(order_status::PENDING)
                .bind(fmt_ts(cutoff))
                .execute(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Lodging settlement target backed by the reservations table.
///
/// Reservations have no failed state. A failed payment leaves the row
/// `unpaid`; the only terminal outcome is `paid`, and abandoned rows are
/// removed by the reaper.
#[derive(Clone)]
pub struct SqliteReservations {
    pool: SqlitePool,
}

impl SqliteReservations {
    /// Seeds an unpaid reservation, the state a checkout session starts from.
    pub async fn insert_unpaid(
        &self,
        transaction_id: TransactionId,
        buyer_id: BuyerId,
    ) -> Result<(), RepoError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            r#"INSERT INTO reservations
                   (transaction_id, buyer_id, payment_status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(transaction_id.to_string())
        .bind(buyer_id.to_string())
        .bind(reservation_status::UNPAID)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SettlementTarget for SqliteReservations {
    async fn progress(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentProgress>, RepoError> {
        let status: Option<(String,)> =
            sqlx::query_as(r#"SELECT payment_status FROM reservations WHERE transaction_id = ?"#)
                .bind(transaction_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        status.map(|(s,)| reservation_progress(&s)).transpose()
    }

    async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE reservations SET payment_status = ?, updated_at = ?
               WHERE transaction_id = ? AND payment_status <> ?"#,
        )
        .bind(reservation_status::PAID)
        .bind(fmt_ts(Utc::now()))
        .bind(transaction_id.to_string())
        .bind(reservation_status::PAID)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
        // No failed column value; touch updated_at so the row records the
        // rejection attempt while staying unpaid and reapable. The status
        // never changes, so this is never a transition.
        sqlx::query(
            r#"UPDATE reservations SET updated_at = ?
               WHERE transaction_id = ? AND payment_status <> ?"#,
        )
        .bind(fmt_ts(Utc::now()))
        .bind(transaction_id.to_string())
        .bind(reservation_status::PAID)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(false)
    }

    async fn reap_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"DELETE FROM reservations WHERE payment_status = ? AND created_at < ?"#,
        )
        .bind(reservation_status::UNPAID)
        .bind(fmt_ts(cutoff))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
