//! Application service unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use settlement_repo::SecretCipher;
    use settlement_types::{
        AuthStateStore, AuthorizationState, BuyerId, BuyerNotification, BuyerNotifier, Credential,
        CredentialStore, Currency, Money, PaymentProgress, PaymentProvider, PaymentRecord,
        ProviderError, RepoError, SellerId, ServiceType, SessionRequest, SettlementError,
        SettlementStatus, SettlementTarget, TokenGrant, TransactionId, UserDirectory,
        WebhookNotification,
    };

    use crate::bus::InProcessBus;
    use crate::service::{
        CredentialVault, DelegatedAuthManager, PaymentSessionBroker, SessionRequestListener,
        SettlementConsumer, TokenRefreshScheduler, WebhookResolver,
    };

    // ── Mocks ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    pub struct MockCredentialStore {
        rows: Mutex<HashMap<SellerId, Credential>>,
    }

    #[async_trait]
    impl CredentialStore for MockCredentialStore {
        async fn upsert(&self, credential: &Credential) -> Result<(), RepoError> {
            self.rows
                .lock()
                .unwrap()
                .insert(credential.seller_id, credential.clone());
            Ok(())
        }

        async fn find(&self, seller_id: SellerId) -> Result<Option<Credential>, RepoError> {
            Ok(self.rows.lock().unwrap().get(&seller_id).cloned())
        }

        async fn expiring_within(
            &self,
            until: DateTime<Utc>,
        ) -> Result<Vec<Credential>, RepoError> {
            let mut due: Vec<Credential> = self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.expires_at <= until)
                .cloned()
                .collect();
            due.sort_by_key(|c| c.expires_at);
            Ok(due)
        }
    }

    #[derive(Default)]
    pub struct MockAuthStateStore {
        rows: Mutex<HashMap<String, AuthorizationState>>,
    }

    #[async_trait]
    impl AuthStateStore for MockAuthStateStore {
        async fn insert(&self, state: &AuthorizationState) -> Result<(), RepoError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&state.state) {
                return Err(RepoError::Conflict("duplicate state".into()));
            }
            rows.insert(state.state.clone(), state.clone());
            Ok(())
        }

        async fn consume(&self, state: &str) -> Result<Option<AuthorizationState>, RepoError> {
            Ok(self.rows.lock().unwrap().remove(state))
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, s| s.created_at >= cutoff);
            Ok((before - rows.len()) as u64)
        }
    }

    /// Provider double with a switchable probe, a set of dead refresh
    /// tokens, and call counting on session creation.
    pub struct MockProvider {
        pub probe_ok: AtomicBool,
        pub dead_refresh_tokens: Mutex<Vec<String>>,
        pub payments: Mutex<HashMap<String, PaymentRecord>>,
        pub create_session_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                probe_ok: AtomicBool::new(true),
                dead_refresh_tokens: Mutex::new(Vec::new()),
                payments: Mutex::new(HashMap::new()),
                create_session_calls: AtomicUsize::new(0),
            }
        }

        fn grant(suffix: &str) -> TokenGrant {
            TokenGrant {
                provider_user_id: "42".into(),
                access_token: format!("access-{}", suffix),
                refresh_token: format!("refresh-{}", suffix),
                public_key: format!("pub-{}", suffix),
                live_mode: false,
                expires_at: Utc::now() + Duration::hours(6),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockProvider {
        async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
            Ok(Self::grant(code))
        }

        async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
            if self
                .dead_refresh_tokens
                .lock()
                .unwrap()
                .iter()
                .any(|t| t == refresh_token)
            {
                return Err(ProviderError::Api {
                    status: 400,
                    message: "invalid_grant".into(),
                });
            }
            Ok(Self::grant("renewed"))
        }

        async fn probe_identity(&self, _access_token: &str) -> bool {
            self.probe_ok.load(Ordering::SeqCst)
        }

        async fn create_session(
            &self,
            _access_token: &str,
            request: &SessionRequest,
            _valid_from: DateTime<Utc>,
            _valid_to: DateTime<Utc>,
        ) -> Result<String, ProviderError> {
            self.create_session_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://pay.test/checkout/{}", request.transaction_id))
        }

        async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, ProviderError> {
            self.payments
                .lock()
                .unwrap()
                .get(payment_id)
                .cloned()
                .ok_or(ProviderError::Api {
                    status: 404,
                    message: "payment not found".into(),
                })
        }
    }

    pub struct MockDirectory {
        pub users: HashMap<String, SellerId>,
    }

    #[async_trait]
    impl UserDirectory for MockDirectory {
        async fn user_id_by_email(&self, email: &str) -> Result<Option<SellerId>, ProviderError> {
            Ok(self.users.get(email).copied())
        }
    }

    #[derive(Default)]
    pub struct MockTarget {
        rows: Mutex<HashMap<TransactionId, PaymentProgress>>,
        pub mark_paid_calls: AtomicUsize,
    }

    impl MockTarget {
        pub fn seed_pending(&self, transaction_id: TransactionId) {
            self.rows
                .lock()
                .unwrap()
                .insert(transaction_id, PaymentProgress::Pending);
        }
    }

    #[async_trait]
    impl SettlementTarget for MockTarget {
        async fn progress(
            &self,
            transaction_id: TransactionId,
        ) -> Result<Option<PaymentProgress>, RepoError> {
            Ok(self.rows.lock().unwrap().get(&transaction_id).copied())
        }

        async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
            self.mark_paid_calls.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&transaction_id) {
                Some(PaymentProgress::Pending) => {
                    rows.insert(transaction_id, PaymentProgress::Paid);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_failed(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&transaction_id) {
                Some(PaymentProgress::Pending) => {
                    rows.insert(transaction_id, PaymentProgress::Failed);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn reap_unpaid_before(&self, _cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
            Ok(0)
        }
    }

    /// Target with no failed state, like the reservations table: a rejection
    /// only records the attempt and the row stays pending.
    #[derive(Default)]
    pub struct MockNoFailTarget {
        rows: Mutex<HashMap<TransactionId, PaymentProgress>>,
        pub rejection_touches: AtomicUsize,
    }

    impl MockNoFailTarget {
        pub fn seed_pending(&self, transaction_id: TransactionId) {
            self.rows
                .lock()
                .unwrap()
                .insert(transaction_id, PaymentProgress::Pending);
        }
    }

    #[async_trait]
    impl SettlementTarget for MockNoFailTarget {
        async fn progress(
            &self,
            transaction_id: TransactionId,
        ) -> Result<Option<PaymentProgress>, RepoError> {
            Ok(self.rows.lock().unwrap().get(&transaction_id).copied())
        }

        async fn mark_paid(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&transaction_id) {
                Some(PaymentProgress::Pending) => {
                    rows.insert(transaction_id, PaymentProgress::Paid);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_failed(&self, transaction_id: TransactionId) -> Result<bool, RepoError> {
            self.rejection_touches.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }

        async fn reap_unpaid_before(&self, _cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    pub struct MockNotifier {
        pub pushes: Mutex<Vec<(BuyerId, BuyerNotification)>>,
    }

    impl MockNotifier {
        pub fn paid_pushes_for(&self, buyer_id: BuyerId) -> usize {
            self.pushes
                .lock()
                .unwrap()
                .iter()
                .filter(|(b, n)| {
                    *b == buyer_id
                        && matches!(
                            n,
                            BuyerNotification::Status {
                                status: SettlementStatus::Paid,
                                ..
                            }
                        )
                })
                .count()
        }
    }

    #[async_trait]
    impl BuyerNotifier for MockNotifier {
        async fn push(&self, buyer_id: BuyerId, notification: BuyerNotification) {
            self.pushes.lock().unwrap().push((buyer_id, notification));
        }
    }

    // ── Fixtures ────────────────────────────────────────────────────────────

    struct Fixture {
        auth: DelegatedAuthManager,
        vault: CredentialVault,
        provider: Arc<MockProvider>,
        states: Arc<MockAuthStateStore>,
        seller: SellerId,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MockProvider::new());
        let states = Arc::new(MockAuthStateStore::default());
        let seller = SellerId::new();

        let vault = CredentialVault::new(
            Arc::new(MockCredentialStore::default()),
            SecretCipher::new([9u8; 32]),
        );

        let directory = MockDirectory {
            users: HashMap::from([("seller@example.test".to_string(), seller)]),
        };

        let auth = DelegatedAuthManager::new(
            vault.clone(),
            states.clone(),
            provider.clone(),
            Arc::new(directory),
        );

        Fixture {
            auth,
            vault,
            provider,
            states,
            seller,
        }
    }

    async fn authorize_seller(fx: &Fixture) {
        let url = fx
            .auth
            .build_authorization_url("seller@example.test", |s| format!("auth?state={}", s))
            .await
            .unwrap();
        let state = url.strip_prefix("auth?state=").unwrap().to_string();
        fx.auth.exchange_code("code-1", &state).await.unwrap();
    }

    fn session_request(seller: SellerId, service_type: ServiceType) -> SessionRequest {
        SessionRequest {
            transaction_id: TransactionId::new(),
            buyer_id: BuyerId::new(),
            seller_id: seller,
            service_type,
            amount: Money::new(100_00, Currency::ARS).unwrap(),
        }
    }

    fn broker(fx: &Fixture) -> PaymentSessionBroker {
        PaymentSessionBroker::new(fx.auth.clone(), fx.provider.clone(), Duration::minutes(15))
    }

    fn payment_notification(payment_id: &str) -> WebhookNotification {
        serde_json::from_value(serde_json::json!({
            "type": "payment",
            "action": "payment.updated",
            "data": { "id": payment_id }
        }))
        .unwrap()
    }

    fn payment_record(
        transaction_id: TransactionId,
        buyer_id: BuyerId,
        seller_id: SellerId,
        service_type: ServiceType,
        status: &str,
    ) -> PaymentRecord {
        serde_json::from_value(serde_json::json!({
            "id": "pay-1",
            "status": status,
            "external_reference": transaction_id.to_string(),
            "metadata": {
                "buyer_id": buyer_id,
                "seller_id": seller_id,
                "service_type": service_type,
            }
        }))
        .unwrap()
    }

    // ── Authorization handshake ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_exchange_code_stores_only_ciphertext() {
        let fx = fixture();
        authorize_seller(&fx).await;

        let stored = fx.vault.get(fx.seller).await.unwrap().unwrap();
        assert_ne!(stored.access_token_cipher, "access-code-1");
        assert_ne!(stored.refresh_token_cipher, "refresh-code-1");

        let plain = fx.vault.reveal(fx.seller).await.unwrap().unwrap();
        assert_eq!(plain.access_token, "access-code-1");
        assert_eq!(plain.refresh_token, "refresh-code-1");
    }

    #[tokio::test]
    async fn test_replayed_state_is_rejected() {
        let fx = fixture();
        let url = fx
            .auth
            .build_authorization_url("seller@example.test", |s| s.to_string())
            .await
            .unwrap();

        fx.auth.exchange_code("code-1", &url).await.unwrap();

        let replay = fx.auth.exchange_code("code-2", &url).await;
        assert!(matches!(replay, Err(SettlementError::UnknownState)));
    }

    #[tokio::test]
    async fn test_unknown_email_yields_user_not_found() {
        let fx = fixture();
        let result = fx
            .auth
            .build_authorization_url("stranger@example.test", |s| s.to_string())
            .await;
        assert!(matches!(result, Err(SettlementError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_reauthorization_supersedes_credential() {
        let fx = fixture();
        authorize_seller(&fx).await;

        let url = fx
            .auth
            .build_authorization_url("seller@example.test", |s| s.to_string())
            .await
            .unwrap();
        fx.auth.exchange_code("code-9", &url).await.unwrap();

        let plain = fx.vault.reveal(fx.seller).await.unwrap().unwrap();
        assert_eq!(plain.access_token, "access-code-9");
    }

    // ── Session brokering ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_session_url_carries_transaction_id() {
        let fx = fixture();
        authorize_seller(&fx).await;

        let request = session_request(fx.seller, ServiceType::Gastronomy);
        let url = broker(&fx).create_session(&request).await.unwrap();

        assert!(url.contains(&request.transaction_id.to_string()));
    }

    #[tokio::test]
    async fn test_revoked_token_stops_session_before_any_provider_call() {
        let fx = fixture();
        authorize_seller(&fx).await;
        fx.provider.probe_ok.store(false, Ordering::SeqCst);

        let request = session_request(fx.seller, ServiceType::Gastronomy);
        let result = broker(&fx).create_session(&request).await;

        assert!(matches!(
            result,
            Err(SettlementError::AccessTokenRevoked(s)) if s == fx.seller
        ));
        assert_eq!(fx.provider.create_session_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_seller_cannot_broker_session() {
        let fx = fixture();
        let request = session_request(SellerId::new(), ServiceType::Lodging);
        let result = broker(&fx).create_session(&request).await;
        assert!(matches!(
            result,
            Err(SettlementError::CredentialNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_brokering_notifies_buyer_of_unavailability() {
        let fx = fixture();
        // No credential stored, so brokering must fail.
        let notifier = Arc::new(MockNotifier::default());
        let listener = SessionRequestListener::new(
            broker(&fx),
            Arc::new(InProcessBus::new()),
            notifier.clone(),
        );

        let request = session_request(fx.seller, ServiceType::Gastronomy);
        let buyer = request.buyer_id;
        listener.handle(request).await;

        let pushes = notifier.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert!(matches!(
            &pushes[0],
            (b, BuyerNotification::PaymentUnavailable { .. }) if *b == buyer
        ));
    }

    // ── Webhook resolution ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_non_payment_notifications_publish_nothing() {
        let fx = fixture();
        let bus = Arc::new(InProcessBus::new());
        let mut lodging = bus.subscribe("settlement.lodging");
        let mut gastronomy = bus.subscribe("settlement.gastronomy");

        let resolver = WebhookResolver::new(fx.provider.clone(), bus.clone());
        let notification: WebhookNotification = serde_json::from_value(serde_json::json!({
            "type": "merchant_order",
            "data": { "id": "555" }
        }))
        .unwrap();

        resolver.handle(notification).await;

        assert!(lodging.try_recv().is_err());
        assert!(gastronomy.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unattributable_payment_publishes_nothing() {
        let fx = fixture();
        let bus = Arc::new(InProcessBus::new());
        let mut lodging = bus.subscribe("settlement.lodging");

        fx.provider.payments.lock().unwrap().insert(
            "pay-1".into(),
            serde_json::from_value(serde_json::json!({
                "id": "pay-1",
                "status": "approved",
                "metadata": {}
            }))
            .unwrap(),
        );

        let resolver = WebhookResolver::new(fx.provider.clone(), bus.clone());
        resolver.handle(payment_notification("pay-1")).await;

        assert!(lodging.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_webhook_event_routes_to_service_topic() {
        let fx = fixture();
        let bus = Arc::new(InProcessBus::new());
        let mut lodging = bus.subscribe("settlement.lodging");

        let tx = TransactionId::new();
        fx.provider.payments.lock().unwrap().insert(
            "pay-1".into(),
            payment_record(tx, BuyerId::new(), fx.seller, ServiceType::Lodging, "approved"),
        );

        let resolver = WebhookResolver::new(fx.provider.clone(), bus.clone());
        resolver.handle(payment_notification("pay-1")).await;

        let payload = lodging.recv().await.unwrap();
        let event: settlement_types::SettlementEvent = serde_json::from_slice(&payload).unwrap();
        assert_eq!(event.transaction_id(), tx);
        assert_eq!(event.service_type(), ServiceType::Lodging);
    }

    // ── Consumers ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_duplicate_paid_outcome_applies_once() {
        let target = Arc::new(MockTarget::default());
        let notifier = Arc::new(MockNotifier::default());
        let consumer = SettlementConsumer::new("gastronomy", target.clone(), notifier.clone());

        let tx = TransactionId::new();
        let buyer = BuyerId::new();
        target.seed_pending(tx);

        let event = settlement_types::SettlementEvent::Webhook {
            transaction_id: tx,
            buyer_id: buyer,
            seller_id: SellerId::new(),
            service_type: ServiceType::Gastronomy,
            status: SettlementStatus::Paid,
            occurred_at: Utc::now(),
        };

        consumer.apply(event.clone()).await;
        consumer.apply(event).await;

        assert_eq!(target.mark_paid_calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.paid_pushes_for(buyer), 1);
    }

    #[tokio::test]
    async fn test_outcome_for_unknown_entity_does_nothing() {
        let target = Arc::new(MockTarget::default());
        let notifier = Arc::new(MockNotifier::default());
        let consumer = SettlementConsumer::new("lodging", target.clone(), notifier.clone());

        consumer
            .apply(settlement_types::SettlementEvent::Webhook {
                transaction_id: TransactionId::new(),
                buyer_id: BuyerId::new(),
                seller_id: SellerId::new(),
                service_type: ServiceType::Lodging,
                status: SettlementStatus::Rejected,
                occurred_at: Utc::now(),
            })
            .await;

        assert_eq!(target.mark_paid_calls.load(Ordering::SeqCst), 0);
        assert!(notifier.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_redelivery_without_failed_state_never_renotifies() {
        let target = Arc::new(MockNoFailTarget::default());
        let notifier = Arc::new(MockNotifier::default());
        let consumer = SettlementConsumer::new("lodging", target.clone(), notifier.clone());

        let tx = TransactionId::new();
        target.seed_pending(tx);

        let rejected = settlement_types::SettlementEvent::Webhook {
            transaction_id: tx,
            buyer_id: BuyerId::new(),
            seller_id: SellerId::new(),
            service_type: ServiceType::Lodging,
            status: SettlementStatus::Rejected,
            occurred_at: Utc::now(),
        };

        consumer.apply(rejected.clone()).await;
        consumer.apply(rejected).await;

        // Every delivery reaches the target, but the entity never changes
        // state and the buyer hears nothing.
        assert_eq!(target.rejection_touches.load(Ordering::SeqCst), 2);
        assert_eq!(
            target.progress(tx).await.unwrap(),
            Some(PaymentProgress::Pending)
        );
        assert!(notifier.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_outcome_after_terminal_is_dropped() {
        let target = Arc::new(MockTarget::default());
        let notifier = Arc::new(MockNotifier::default());
        let consumer = SettlementConsumer::new("gastronomy", target.clone(), notifier.clone());

        let tx = TransactionId::new();
        target.seed_pending(tx);

        let paid = settlement_types::SettlementEvent::Webhook {
            transaction_id: tx,
            buyer_id: BuyerId::new(),
            seller_id: SellerId::new(),
            service_type: ServiceType::Gastronomy,
            status: SettlementStatus::Paid,
            occurred_at: Utc::now(),
        };
        let rejected = settlement_types::SettlementEvent::Webhook {
            transaction_id: tx,
            buyer_id: BuyerId::new(),
            seller_id: SellerId::new(),
            service_type: ServiceType::Gastronomy,
            status: SettlementStatus::Rejected,
            occurred_at: Utc::now(),
        };

        consumer.apply(paid).await;
        consumer.apply(rejected).await;

        assert_eq!(
            target.progress(tx).await.unwrap(),
            Some(PaymentProgress::Paid)
        );
    }

    // ── End to end ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_gastronomy_settlement_end_to_end() {
        let fx = fixture();
        authorize_seller(&fx).await;

        let bus = Arc::new(InProcessBus::new());
        let mut gastronomy = bus.subscribe("settlement.gastronomy");

        let target = Arc::new(MockTarget::default());
        let notifier = Arc::new(MockNotifier::default());
        let consumer = SettlementConsumer::new("gastronomy", target.clone(), notifier.clone());
        let listener = SessionRequestListener::new(broker(&fx), bus.clone(), notifier.clone());
        let resolver = WebhookResolver::new(fx.provider.clone(), bus.clone());

        // A domain service requests a session for a 100.00 ARS order.
        let request = session_request(fx.seller, ServiceType::Gastronomy);
        let tx = request.transaction_id;
        let buyer = request.buyer_id;
        target.seed_pending(tx);

        listener.handle(request).await;

        // The SESSION_CREATED event reaches the gastronomy consumer, which
        // pushes the checkout URL to the buyer.
        let payload = gastronomy.recv().await.unwrap();
        consumer
            .apply(serde_json::from_slice(&payload).unwrap())
            .await;

        {
            let pushes = notifier.pushes.lock().unwrap();
            assert!(matches!(
                &pushes[0],
                (b, BuyerNotification::SessionUrl { url, .. })
                    if *b == buyer && url.contains(&tx.to_string())
            ));
        }

        // The provider notifies payment approval, twice.
        fx.provider.payments.lock().unwrap().insert(
            "pay-1".into(),
            payment_record(tx, buyer, fx.seller, ServiceType::Gastronomy, "approved"),
        );

        for _ in 0..2 {
            resolver.handle(payment_notification("pay-1")).await;
            let payload = gastronomy.recv().await.unwrap();
            consumer
                .apply(serde_json::from_slice(&payload).unwrap())
                .await;
        }

        // The order is paid exactly once and the buyer saw exactly one PAID
        // push despite the duplicate delivery.
        assert_eq!(
            target.progress(tx).await.unwrap(),
            Some(PaymentProgress::Paid)
        );
        assert_eq!(target.mark_paid_calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.paid_pushes_for(buyer), 1);
    }

    // ── Refresh scheduler ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_refresh_scan_survives_individual_failures() {
        let fx = fixture();
        authorize_seller(&fx).await;

        // A second seller whose refresh token the provider has revoked.
        let revoked_seller = SellerId::new();
        let dead_grant = TokenGrant {
            provider_user_id: "13".into(),
            access_token: "access-dead".into(),
            refresh_token: "refresh-dead".into(),
            public_key: "pub-dead".into(),
            live_mode: false,
            expires_at: Utc::now() + Duration::hours(1),
        };
        fx.vault.store(revoked_seller, &dead_grant).await.unwrap();
        fx.provider
            .dead_refresh_tokens
            .lock()
            .unwrap()
            .push("refresh-dead".into());

        let scheduler = TokenRefreshScheduler::new(
            fx.auth.clone(),
            Duration::days(7),
            std::time::Duration::from_secs(86_400),
        );
        scheduler.run_once().await.unwrap();

        // The healthy seller was refreshed despite the revoked one failing.
        let plain = fx.vault.reveal(fx.seller).await.unwrap().unwrap();
        assert_eq!(plain.access_token, "access-renewed");

        let dead = fx.vault.reveal(revoked_seller).await.unwrap().unwrap();
        assert_eq!(dead.access_token, "access-dead");
    }

    #[tokio::test]
    async fn test_state_store_reap_keeps_fresh_states() {
        let fx = fixture();

        let mut stale = AuthorizationState::new("stale".into(), fx.seller);
        stale.created_at = Utc::now() - Duration::hours(3);
        fx.states.insert(&stale).await.unwrap();
        fx.states
            .insert(&AuthorizationState::new("fresh".into(), fx.seller))
            .await
            .unwrap();

        let removed = fx
            .states
            .delete_older_than(Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(fx.states.consume("fresh").await.unwrap().is_some());
    }
}
