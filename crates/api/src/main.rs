//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, ReservationService};
use booking::{
    HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, ReservationLifecycleService,
    Timeouts,
};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryReservationStore, PostgresReservationStore, ReservationStore};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_store(config: &Config) -> Arc<dyn ReservationStore> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, using in-memory reservation store");
        return Arc::new(InMemoryReservationStore::new());
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .expect("failed to connect to Postgres");
    let store = PostgresReservationStore::new(pool);
    store
        .run_migrations()
        .await
        .expect("failed to run migrations");
    tracing::info!(
        max_connections = config.database_max_connections,
        "connected to Postgres"
    );
    Arc::new(store)
}

fn build_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match &config.payment_service_url {
        Some(url) => {
            tracing::info!(%url, "using HTTP payment gateway");
            Arc::new(HttpPaymentGateway::new(url.as_str()))
        }
        None => {
            tracing::warn!("PAYMENT_SERVICE_URL not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    }
}

/// Starts the payment event consumer when a topic is configured.
#[cfg(feature = "kafka")]
fn spawn_consumer(
    config: &Config,
    service: Arc<ReservationService>,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    use payment_events::{KafkaConfig, KafkaTransport, PaymentEventConsumer};

    let settings = config.kafka.as_ref()?;
    let mut kafka = KafkaConfig::new(&settings.brokers, &settings.topic)
        .with_group_id(&settings.group_id);
    if let Some(username) = &settings.username {
        kafka = kafka.with_credentials(username, settings.password.clone().unwrap_or_default());
    }

    let transport = KafkaTransport::connect(&kafka).expect("failed to connect to Kafka");
    let consumer = PaymentEventConsumer::new(transport, service);
    Some(tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown).await {
            tracing::error!(error = %e, "payment event consumer stopped with error");
        }
    }))
}

#[cfg(not(feature = "kafka"))]
fn spawn_consumer(
    config: &Config,
    _service: Arc<ReservationService>,
    _shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if config.kafka.is_some() {
        tracing::warn!("Kafka settings ignored, binary built without the kafka feature");
    }
    None
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the lifecycle service
    let store = build_store(&config).await;
    let gateway = build_gateway(&config);
    let service: Arc<ReservationService> = Arc::new(
        ReservationLifecycleService::new(store, gateway)
            .with_timeouts(Timeouts::new(config.store_timeout, config.payment_timeout)),
    );

    // 4. Start the payment event consumer
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = spawn_consumer(&config, service.clone(), shutdown_rx);
    if consumer.is_none() {
        tracing::info!("payment event consumer not started");
    }

    // 5. Build the application
    let app = api::create_app(Arc::new(AppState::new(service)), metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop the consumer after in-flight requests drain
    let _ = shutdown_tx.send(true);
    if let Some(handle) = consumer {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "payment event consumer task failed");
        }
    }

    tracing::info!("server shut down gracefully");
}
