use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod bootstrap;
mod cache;
mod config;
mod consumer;
mod errors;
mod gateway;
mod http;
mod messaging;
mod metrics;
mod models;
mod service;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use cache::OrderCache;
use config::Config;
use consumer::OrderConsumer;
use gateway::IngestionGateway;
use messaging::{KafkaPublisher, KafkaSubscriber};
use service::OrderService;
use store::PgOrderStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order service");

    let config = Config::from_env()?;

    // === 1. Durable store ===
    tracing::info!("Connecting to PostgreSQL...");
    let store = Arc::new(
        PgOrderStore::connect(&config.database_url, config.database_max_connections).await?,
    );
    store.ping().await?;
    tracing::info!("✅ PostgreSQL connection established");

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 3. Warm the cache from committed orders ===
    let service = Arc::new(OrderService::new(
        store.clone(),
        Arc::new(OrderCache::new()),
        metrics.clone(),
    ));

    if let Err(e) = service.restore_cache().await {
        tracing::error!(error = %e, "Failed to restore cache, starting with an empty cache");
    }

    // === 4. Message channel (blocks until a publisher exists) ===
    let kafka = &config.kafka;
    let publisher = bootstrap::connect_with_retry(&config.bootstrap, &metrics, move || {
        KafkaPublisher::connect(kafka)
    })
    .await?;
    let gateway = Arc::new(IngestionGateway::new(Arc::new(publisher), metrics.clone()));

    // === 5. Queue consumer ===
    let subscriber = KafkaSubscriber::subscribe(&config.kafka)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = OrderConsumer::new(subscriber, service.clone(), metrics.clone());
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx));

    // === 6. HTTP surface (runs until SIGINT/SIGTERM) ===
    let state = http::AppState {
        service,
        gateway,
        metrics,
    };
    let served = http::serve(state, &config.http_host, config.http_port).await;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_handle.await {
        tracing::error!(error = %e, "Queue consumer task failed");
    }
    store.close().await;

    served?;
    tracing::info!("👋 Order service stopped");
    Ok(())
}
