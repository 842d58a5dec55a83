use fix_engine::api::{self, AppState};
use fix_engine::bus::{self, FillsProducer, OrdersConsumer};
use fix_engine::clients::{PricingClient, TickerCacheClient};
use fix_engine::config::AppConfig;
use fix_engine::metrics::EngineMetrics;
use fix_engine::store::{ExecutionStore, PgExecutionStore};
use fix_engine::workers::{FillPublisher, FillSchedulerWorker, OrderIntakeWorker};
use fix_engine::{error::EngineError, logging};

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const GIT_HASH: &str = env!("GIT_HASH");
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = AppConfig::from_env();
    logging::init_logging(&config);

    tracing::info!(git_hash = GIT_HASH, app_env = %config.app_env, "starting fix-engine");

    let metrics = Arc::new(EngineMetrics::default());

    let store: Arc<dyn ExecutionStore> = Arc::new(PgExecutionStore::connect(&config.database_url).await?);

    bus::ensure_fills_topic(&config.kafka).await?;
    let orders_consumer = OrdersConsumer::new(&config.kafka)?;
    let fills_producer = Arc::new(FillsProducer::new(&config.kafka)?);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| EngineError::Malformed(format!("failed to build http client: {e}")))?;

    let ticker_cache = Arc::new(TickerCacheClient::new(
        http_client.clone(),
        config.security_svc.base_url(),
        config.ticker_cache_ttl,
    ));
    let pricing_client = Arc::new(PricingClient::new(http_client, config.pricing_svc.base_url()));

    let cancel = CancellationToken::new();

    let intake = OrderIntakeWorker::new(orders_consumer, ticker_cache, store.clone(), metrics.clone());
    let intake_cancel = cancel.clone();
    let intake_handle = tokio::spawn(async move { intake.run(intake_cancel).await });

    let publisher = FillPublisher::new(fills_producer);
    let scheduler = FillSchedulerWorker::new(
        store.clone(),
        pricing_client,
        publisher,
        metrics.clone(),
        StdRng::from_entropy(),
    );
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    let state = Arc::new(AppState::new(store, metrics));
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .map_err(|e| EngineError::Malformed(format!("failed to bind port {}: {e}", config.http_port)))?;

    tracing::info!(port = config.http_port, "http read api listening");

    let server_cancel = cancel.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_cancel.cancelled().await;
    });
    let server_handle = tokio::spawn(server);

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    let shutdown = async {
        let _ = tokio::join!(intake_handle, scheduler_handle, server_handle);
    };
    if tokio::time::timeout(SHUTDOWN_BUDGET, shutdown).await.is_err() {
        tracing::warn!("workers did not stop within shutdown budget, exiting anyway");
    }

    tracing::info!("fix-engine stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
