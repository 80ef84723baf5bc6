//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use settlement_types::{
    AuthStateStore, AuthorizationState, BuyerId, Credential, CredentialStore, PaymentProgress,
    RepoError, SellerId, SettlementTarget, TransactionId,
};

use crate::types::{
    DbAuthorizationState, DbCredential, fmt_ts, order_progress, order_status,
    reservation_progress, reservation_status,
};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository implementation.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    tracing::debug!(migration = name, "schema migration applied");
    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;

        execute_migration(
            &pool,
            include_str!("../migrations/0001_create_tables.sql"),
            "0001",
        )
        .await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Order-table settlement target sharing this repository's pool.
    pub fn orders(&self) -> PostgresOrders {
        PostgresOrders {
            pool: self.pool.clone(),
        }
    }

    /// Reservation-table settlement target sharing this repository's pool.
    pub fn reservations(&self) -> PostgresReservations {
        PostgresReservations {
            pool: self.pool.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CredentialStore for PostgresRepo {
    async fn upsert(&self, credential: &Credential) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO credentials
                   (seller_id, access_token_cipher, refresh_token_cipher, public_key_cipher,
                    provider_user_id, live_mode, expires_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (seller_id) DO UPDATE SET
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
               FROM credentials WHERE seller_id = $1"#,
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
               FROM credentials WHERE expires_at <= $1 AND refresh_token_cipher <> ''
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
impl AuthStateStore for PostgresRepo {
    async fn insert(&self, state: &AuthorizationState) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO authorization_states (state, seller_user_id, created_at)
               VALUES ($1, $2, $3)"#,
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
            r#"DELETE FROM authorization_states WHERE state = $1
               RETURNING state, seller_user_id, created_at"#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbAuthorizationState::into_domain).transpose()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(r#"DELETE FROM authorization_states WHERE created_at < $1"#)
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
pub struct PostgresOrders {
    pool: PgPool,
}

impl PostgresOrders {
    /// Seeds a pending order, the state a checkout session starts from.
    pub async fn insert_pending(
        &self,
        transaction_id: TransactionId,
        buyer_id: BuyerId,
    ) -> Result<(), RepoError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            r#"INSERT INTO orders (transaction_id, buyer_id, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5)"#,
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
impl SettlementTarget for PostgresOrders {
    async fn progress(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentProgress>, RepoError> {
        let status: Option<(String,)> =
            sqlx::query_as(r#"SELECT status FROM orders WHERE transaction_id = $1"#)
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
            r#"UPDATE orders SET status = $1, updated_at = $2
               WHERE transaction_id = $3 AND status = $4"#,
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
            r#"UPDATE orders SET status = $1, updated_at = $2
               WHERE transaction_id = $3 AND status = $4"#,
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
            sqlx::query(r#"DELETE FROM orders WHERE status = $1 AND created_at < $2"#)
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
pub struct PostgresReservations {
    pool: PgPool,
}

impl PostgresReservations {
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
               VALUES ($1, $2, $3, $4, $5)"#,
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
impl SettlementTarget for PostgresReservations {
    async fn progress(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentProgress>, RepoError> {
        let status: Option<(String,)> = sqlx::query_as(
            r#"SELECT payment_status FROM reservations WHERE transaction_id = $1"#,
        )
        .bind(transaction_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        status.map(|(s,)| reservation_progress(&s)).transpose()
    }

    async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE reservations SET payment_status = $1, updated_at = $2
               WHERE transaction_id = $3 AND payment_status <> $4"#,
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
            r#"UPDATE reservations SET updated_at = $1
               WHERE transaction_id = $2 AND payment_status <> $3"#,
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
            r#"DELETE FROM reservations WHERE payment_status = $1 AND created_at < $2"#,
        )
        .bind(reservation_status::UNPAID)
        .bind(fmt_ts(cutoff))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
