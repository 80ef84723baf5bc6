//! # Settlement Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and secret cipher
//! - Build the provider clients, bus, services, and background tasks
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settlement_hex::{
    BuyerChannels, CredentialVault, DelegatedAuthManager, InProcessBus, PaymentSessionBroker,
    SessionRequestListener, SettlementConsumer, StaleRecordReaper, TokenRefreshScheduler,
    WebhookResolver,
    inbound::{AppState, HttpServer},
};
use settlement_provider::{ProviderClient, ProviderConfig, UserDirectoryClient};
use settlement_repo::{SecretCipher, build_repo};
use settlement_types::{
    AuthStateStore, BuyerNotifier, CredentialStore, PaymentProvider, ServiceType,
    SettlementTarget, UserDirectory, PAYMENT_REQUESTED_KEY,
};

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("settlement-service"), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,settlement_app=debug,settlement_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting settlement server on port {}", config.port);

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);
    let orders = repo.orders();
    let reservations = repo.reservations();

    let cipher = SecretCipher::from_hex_key(&config.credential_key)?;

    // Outbound clients
    let provider = Arc::new(ProviderClient::new(ProviderConfig {
        base_url: config.provider_base_url.clone(),
        client_id: config.provider_client_id.clone(),
        client_secret: config.provider_client_secret.clone(),
        redirect_uri: config.provider_redirect_uri.clone(),
        platform_token: config.provider_platform_token.clone(),
        notification_url: config.notification_url.clone(),
    }));
    let directory: Arc<dyn UserDirectory> =
        Arc::new(UserDirectoryClient::new(config.user_directory_url.clone()));

    // Message bus and buyer channels
    let bus = Arc::new(InProcessBus::new());
    let channels = Arc::new(BuyerChannels::new());
    let notifier: Arc<dyn BuyerNotifier> = channels.clone();

    // Services
    let credentials: Arc<dyn CredentialStore> = repo.clone();
    let states: Arc<dyn AuthStateStore> = repo.clone();
    let provider_port: Arc<dyn PaymentProvider> = provider.clone();

    let vault = CredentialVault::new(credentials, cipher);
    let auth = DelegatedAuthManager::new(vault, states.clone(), provider_port.clone(), directory);
    let broker = PaymentSessionBroker::new(
        auth.clone(),
        provider_port.clone(),
        chrono::Duration::minutes(config.session_window_minutes),
    );
    let resolver = WebhookResolver::new(provider_port, bus.clone());

    // Bus subscriptions are taken before any task starts publishing.
    let session_requests = bus.subscribe(PAYMENT_REQUESTED_KEY);
    let gastronomy_messages = bus.subscribe(ServiceType::Gastronomy.routing_key());
    let lodging_messages = bus.subscribe(ServiceType::Lodging.routing_key());

    let listener = SessionRequestListener::new(broker, bus.clone(), notifier.clone());
    let gastronomy_consumer = SettlementConsumer::new(
        "gastronomy",
        Arc::new(orders.clone()) as Arc<dyn SettlementTarget>,
        notifier.clone(),
    );
    let lodging_consumer = SettlementConsumer::new(
        "lodging",
        Arc::new(reservations.clone()) as Arc<dyn SettlementTarget>,
        notifier,
    );

    tokio::spawn(listener.run(session_requests));
    tokio::spawn(gastronomy_consumer.run(gastronomy_messages));
    tokio::spawn(lodging_consumer.run(lodging_messages));

    // Background maintenance
    let refresh = TokenRefreshScheduler::new(
        auth.clone(),
        chrono::Duration::days(config.refresh_lead_days),
        std::time::Duration::from_secs(config.refresh_interval_hours * 3600),
    );
    tokio::spawn(refresh.run());

    let reaper = StaleRecordReaper::new(
        vec![
            ("orders", Arc::new(orders) as Arc<dyn SettlementTarget>),
            (
                "reservations",
                Arc::new(reservations) as Arc<dyn SettlementTarget>,
            ),
        ],
        states,
        chrono::Duration::hours(config.reaper_entity_ttl_hours),
        chrono::Duration::minutes(config.reaper_state_ttl_minutes),
        std::time::Duration::from_secs(config.reaper_interval_minutes * 60),
    );
    tokio::spawn(reaper.run());

    // HTTP server
    let authorize_url = {
        let provider = provider.clone();
        Arc::new(move |state: &str| provider.authorization_url(state))
            as settlement_hex::inbound::AuthorizeUrlBuilder
    };

    let state = AppState {
        auth,
        resolver,
        channels,
        authorize_url,
        webhook_secret: config.webhook_secret.clone(),
    };

    let server = HttpServer::new(state);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
