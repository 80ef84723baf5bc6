//! Domain settlement consumers.
//!
//! One consumer per service type, subscribed to that type's routing key.
//! Applies settlement outcomes to the domain entity behind the
//! [`SettlementTarget`] port and pushes live updates to the buyer.
//!
//! Delivery is at-least-once, so application is idempotent: a terminal
//! entity state is never overwritten, and duplicate outcomes are dropped
//! without re-notifying the buyer.

use std::sync::Arc;

use tokio::sync::mpsc;

use settlement_types::{
    BuyerNotification, BuyerNotifier, PaymentProgress, SettlementEvent, SettlementStatus,
    SettlementTarget,
};

#[derive(Clone)]
pub struct SettlementConsumer {
    /// Human-readable name for logs (`"gastronomy"`, `"lodging"`).
    name: &'static str,
    target: Arc<dyn SettlementTarget>,
    notifier: Arc<dyn BuyerNotifier>,
}

impl SettlementConsumer {
    pub fn new(
        name: &'static str,
        target: Arc<dyn SettlementTarget>,
        notifier: Arc<dyn BuyerNotifier>,
    ) -> Self {
        Self {
            name,
            target,
            notifier,
        }
    }

    /// Drains a bus subscription until the bus shuts down. Malformed
    /// payloads are logged and dropped; they must never stall the stream.
    pub async fn run(self, mut messages: mpsc::UnboundedReceiver<Vec<u8>>) {
        tracing::info!(consumer = self.name, "settlement consumer started");

        while let Some(payload) = messages.recv().await {
            let event: SettlementEvent = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(consumer = self.name, error = %e,
                        "dropping malformed settlement message");
                    continue;
                }
            };

            self.apply(event).await;
        }

        tracing::info!(consumer = self.name, "settlement consumer stopped");
    }

    /// Applies a single settlement event.
    pub async fn apply(&self, event: SettlementEvent) {
        match event {
            SettlementEvent::SessionCreated {
                transaction_id,
                buyer_id,
                session_url,
                ..
            } => {
                if session_url.is_empty() {
                    tracing::error!(consumer = self.name, %transaction_id,
                        "dropping session event with empty url");
                    return;
                }
                self.notifier
                    .push(
                        buyer_id,
                        BuyerNotification::SessionUrl {
                            transaction_id,
                            url: session_url,
                        },
                    )
                    .await;
            }
            SettlementEvent::Webhook {
                transaction_id,
                buyer_id,
                status,
                ..
            } => {
                let progress = match self.target.progress(transaction_id).await {
                    Ok(Some(progress)) => progress,
                    Ok(None) => {
                        tracing::warn!(consumer = self.name, %transaction_id,
                            "no entity for settlement outcome, dropping");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(consumer = self.name, %transaction_id, error = %e,
                            "failed to load entity progress");
                        return;
                    }
                };

                // First terminal outcome wins. Duplicates and late
                // conflicting outcomes are dropped without re-notifying.
                if progress.is_terminal() {
                    tracing::debug!(consumer = self.name, %transaction_id, %status,
                        "entity already settled, dropping outcome");
                    return;
                }

                let transitioned = match status {
                    SettlementStatus::Paid => self.target.mark_paid(transaction_id).await,
                    SettlementStatus::Rejected => self.target.mark_failed(transaction_id).await,
                    SettlementStatus::Pending | SettlementStatus::Unknown => {
                        tracing::debug!(consumer = self.name, %transaction_id, %status,
                            "non-terminal outcome, nothing to apply");
                        return;
                    }
                };

                let transitioned = match transitioned {
                    Ok(transitioned) => transitioned,
                    Err(e) => {
                        tracing::error!(consumer = self.name, %transaction_id, %status, error = %e,
                            "failed to apply settlement outcome");
                        return;
                    }
                };

                // The buyer is told about state changes, not deliveries. An
                // outcome that left the entity as it was (a redelivery that
                // lost a race, or a rejection against a target with no failed
                // state) must not push again.
                if !transitioned {
                    tracing::debug!(consumer = self.name, %transaction_id, %status,
                        "entity state unchanged, not notifying");
                    return;
                }

                tracing::info!(consumer = self.name, %transaction_id, %status,
                    "settlement outcome applied");

                self.notifier
                    .push(
                        buyer_id,
                        BuyerNotification::Status {
                            transaction_id,
                            status,
                        },
                    )
                    .await;
            }
        }
    }
}
