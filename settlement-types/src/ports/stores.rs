//! Persistence ports.

use chrono::{DateTime, Utc};

use crate::domain::{
    AuthorizationState, Credential, PaymentProgress, SellerId, TransactionId,
};
use crate::error::RepoError;

/// Durable storage for seller credentials. Exclusively owned by the vault;
/// no other component reads ciphertext directly.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Inserts a credential, or supersedes the existing row in place when the
    /// seller re-authorizes.
    async fn upsert(&self, credential: &Credential) -> Result<(), RepoError>;

    async fn find(&self, seller_id: SellerId) -> Result<Option<Credential>, RepoError>;

    /// All credentials expiring at or before `until`, for the refresh
    /// scheduler's daily scan. Rows without a stored refresh token are
    /// excluded; they cannot be refreshed, only re-authorized.
    async fn expiring_within(&self, until: DateTime<Utc>) -> Result<Vec<Credential>, RepoError>;
}

/// Storage for the single-use authorization-code correlators.
#[async_trait::async_trait]
pub trait AuthStateStore: Send + Sync + 'static {
    async fn insert(&self, state: &AuthorizationState) -> Result<(), RepoError>;

    /// Atomically removes and returns the row for `state`. A second call with
    /// the same value returns `None` - this is what makes the state
    /// single-use.
    async fn consume(&self, state: &str) -> Result<Option<AuthorizationState>, RepoError>;

    /// Reaps orphaned states older than `cutoff`. Returns the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError>;
}

/// The domain entity a settlement consumer applies outcomes to (an order or
/// a reservation). The adapter owns the mapping from the entity's own status
/// vocabulary onto the canonical [`PaymentProgress`].
///
/// All mutations MUST be atomic read-modify-write at the store level; that
/// atomicity, together with the consumer's terminal-state check, is what
/// makes duplicate deliveries safe.
#[async_trait::async_trait]
pub trait SettlementTarget: Send + Sync + 'static {
    /// Payment progress of the entity for `transaction_id`, or `None` when no
    /// entity exists (it may have been reaped, or the message is foreign).
    async fn progress(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentProgress>, RepoError>;

    /// Applies a paid outcome. Returns whether the entity transitioned to a
    /// new state; `false` means another delivery got there first (or the
    /// entity has no such transition), and the buyer must not be re-notified.
    async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError>;

    /// Applies a failed outcome, with the same transition contract as
    /// [`SettlementTarget::mark_paid`]. Targets without a failed state (such
    /// as reservations) record the attempt and return `false`.
    async fn mark_failed(&self, transaction_id: TransactionId) -> Result<bool, RepoError>;

    /// Deletes entities still unpaid past `cutoff`. The terminal failure path
    /// for abandoned payment sessions. Returns the number removed.
    async fn reap_unpaid_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError>;
}
