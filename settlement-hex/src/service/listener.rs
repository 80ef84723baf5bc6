//! Session request listener.
//!
//! Consumes `payment.requested` messages from domain services, brokers a
//! checkout session for each, and announces the result: a `SESSION_CREATED`
//! event on the settlement bus on success, or a direct push to the buyer
//! when no session could be created.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use settlement_types::{
    BuyerNotification, BuyerNotifier, SessionRequest, SettlementEvent, SettlementPublisher,
};

use super::broker::PaymentSessionBroker;

#[derive(Clone)]
pub struct SessionRequestListener {
    broker: PaymentSessionBroker,
    publisher: Arc<dyn SettlementPublisher>,
    notifier: Arc<dyn BuyerNotifier>,
}

impl SessionRequestListener {
    pub fn new(
        broker: PaymentSessionBroker,
        publisher: Arc<dyn SettlementPublisher>,
        notifier: Arc<dyn BuyerNotifier>,
    ) -> Self {
        Self {
            broker,
            publisher,
            notifier,
        }
    }

    /// Drains the `payment.requested` subscription until the bus shuts down.
    pub async fn run(self, mut messages: mpsc::UnboundedReceiver<Vec<u8>>) {
        tracing::info!("session request listener started");

        while let Some(payload) = messages.recv().await {
            let request: SessionRequest = match serde_json::from_slice(&payload) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!(error = %e, "dropping malformed session request");
                    continue;
                }
            };

            self.handle(request).await;
        }

        tracing::info!("session request listener stopped");
    }

    /// Brokers one session request end to end.
    pub async fn handle(&self, request: SessionRequest) {
        let transaction_id = request.transaction_id;
        let buyer_id = request.buyer_id;

        let session_url = match self.broker.create_session(&request).await {
            Ok(url) => url,
            Err(e) => {
                // The buyer is waiting on a payment page; tell them it is
                // not coming rather than leaving them hanging.
                tracing::error!(%transaction_id, error = %e, "could not broker payment session");
                self.notifier
                    .push(
                        buyer_id,
                        BuyerNotification::PaymentUnavailable { transaction_id },
                    )
                    .await;
                return;
            }
        };

        let event = SettlementEvent::SessionCreated {
            transaction_id,
            buyer_id,
            seller_id: request.seller_id,
            service_type: request.service_type,
            session_url,
            occurred_at: Utc::now(),
        };

        if let Err(e) = self.publisher.publish(&event).await {
            tracing::error!(%transaction_id, error = %e, "failed to publish session event");
        }
    }
}
