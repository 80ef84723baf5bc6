//! Background maintenance tasks: token refresh and stale record reaping.

use std::sync::Arc;

use chrono::{Duration, Utc};

use settlement_types::{AuthStateStore, SettlementError, SettlementTarget};

use super::authorization::DelegatedAuthManager;

// ─────────────────────────────────────────────────────────────────────────────
// Token refresh scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Periodically refreshes credentials approaching expiry, so sellers keep a
/// usable token without re-authorizing.
#[derive(Clone)]
pub struct TokenRefreshScheduler {
    auth: DelegatedAuthManager,
    /// Credentials expiring within this lead time get refreshed.
    lead: Duration,
    /// Pause between scans.
    interval: std::time::Duration,
}

impl TokenRefreshScheduler {
    pub fn new(auth: DelegatedAuthManager, lead: Duration, interval: std::time::Duration) -> Self {
        Self {
            auth,
            lead,
            interval,
        }
    }

    /// Runs scans forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "token refresh scan failed");
            }
        }
    }

    /// One refresh scan. A failure for one seller is logged and never stops
    /// the rest of the batch.
    pub async fn run_once(&self) -> Result<(), SettlementError> {
        let due = self
            .auth
            .vault()
            .expiring_within(Utc::now() + self.lead)
            .await?;

        if due.is_empty() {
            return Ok(());
        }

        tracing::info!(count = due.len(), "refreshing expiring credentials");

        for credential in due {
            let seller_id = credential.seller_id;
            if let Err(e) = self.auth.refresh(seller_id).await {
                tracing::warn!(%seller_id, error = %e, "credential refresh failed");
            }
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stale record reaper
// ─────────────────────────────────────────────────────────────────────────────

/// Periodically deletes entities whose payment session came and went without
/// a settlement, plus orphaned authorization states.
pub struct StaleRecordReaper {
    targets: Vec<(&'static str, Arc<dyn SettlementTarget>)>,
    states: Arc<dyn AuthStateStore>,
    /// Entities unpaid for longer than this are abandoned.
    entity_ttl: Duration,
    /// Authorization states older than this were never redeemed.
    state_ttl: Duration,
    /// Pause between sweeps.
    interval: std::time::Duration,
}

impl StaleRecordReaper {
    pub fn new(
        targets: Vec<(&'static str, Arc<dyn SettlementTarget>)>,
        states: Arc<dyn AuthStateStore>,
        entity_ttl: Duration,
        state_ttl: Duration,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            targets,
            states,
            entity_ttl,
            state_ttl,
            interval,
        }
    }

    /// Runs sweeps forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One sweep across all targets and the state store. Failures are logged
    /// per store; the sweep always finishes.
    pub async fn run_once(&self) {
        let entity_cutoff = Utc::now() - self.entity_ttl;
        for (name, target) in &self.targets {
            match target.reap_unpaid_before(entity_cutoff).await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(target = name, removed, "reaped abandoned entities");
                }
                Err(e) => {
                    tracing::error!(target = name, error = %e, "entity reap failed");
                }
            }
        }

        let state_cutoff = Utc::now() - self.state_ttl;
        match self.states.delete_older_than(state_cutoff).await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!(removed, "reaped orphaned authorization states");
            }
            Err(e) => {
                tracing::error!(error = %e, "authorization state reap failed");
            }
        }
    }
}
