//! Webhook resolver.
//!
//! Turns a provider callback into a canonical settlement event on the bus.
//! The callback body is only a pointer; the authoritative payment record is
//! always fetched back from the provider before anything is published.

use std::sync::Arc;

use chrono::Utc;
use std::str::FromStr;

use settlement_types::{
    PaymentProvider, SettlementError, SettlementEvent, SettlementPublisher, SettlementStatus,
    TransactionId, WebhookNotification,
};

#[derive(Clone)]
pub struct WebhookResolver {
    provider: Arc<dyn PaymentProvider>,
    publisher: Arc<dyn SettlementPublisher>,
}

impl WebhookResolver {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        publisher: Arc<dyn SettlementPublisher>,
    ) -> Self {
        Self {
            provider,
            publisher,
        }
    }

    /// Processes one provider notification. Never fails from the caller's
    /// perspective: the HTTP handler has already acknowledged the callback,
    /// and an unattributable or failed notification is logged and dropped.
    pub async fn handle(&self, notification: WebhookNotification) {
        if notification.notification_type != "payment" {
            tracing::debug!(notification_type = %notification.notification_type,
                "ignoring non-payment notification");
            return;
        }

        if let Err(e) = self.resolve(&notification.data.id).await {
            tracing::error!(payment_id = %notification.data.id, error = %e,
                "failed to resolve payment notification");
        }
    }

    async fn resolve(&self, payment_id: &str) -> Result<(), SettlementError> {
        let record = self.provider.fetch_payment(payment_id).await?;

        let Some(metadata) = record.parsed_metadata() else {
            tracing::warn!(payment_id, "payment record has no settlement metadata, dropping");
            return Ok(());
        };

        let Some(reference) = record.external_reference.as_deref() else {
            tracing::warn!(payment_id, "payment record has no external reference, dropping");
            return Ok(());
        };

        let transaction_id = match TransactionId::from_str(reference) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(payment_id, reference, "external reference is not a transaction id");
                return Ok(());
            }
        };

        let status = SettlementStatus::from_provider(&record.status);
        if status == SettlementStatus::Unknown {
            tracing::warn!(payment_id, raw_status = %record.status,
                "unrecognized provider status, publishing as UNKNOWN");
        }

        let event = SettlementEvent::Webhook {
            transaction_id,
            buyer_id: metadata.buyer_id,
            seller_id: metadata.seller_id,
            service_type: metadata.service_type,
            status,
            occurred_at: Utc::now(),
        };

        match self.publisher.publish(&event).await {
            Ok(()) => {
                tracing::info!(%transaction_id, %status, service_type = %metadata.service_type,
                    "settlement event published");
            }
            Err(e) => {
                // The provider will redeliver the webhook; the next attempt
                // re-publishes.
                tracing::error!(%transaction_id, error = %e, "failed to publish settlement event");
            }
        }
        Ok(())
    }
}
