//! Outbox relay worker entry point.

mod config;

use std::sync::Arc;

use broker::{EventBroker, KafkaBroker};
use config::Config;
use domain::PostgresOrderRepository;
use events::Topology;
use outbox::{OutboxRelay, PostgresOutboxStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
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

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");

    // 2. Install Prometheus metrics exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()
        .expect("failed to install Prometheus exporter");

    // 3. Connect to Postgres and apply migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");
    PostgresOrderRepository::new(pool.clone())
        .run_migrations()
        .await
        .expect("failed to run migrations");

    // 4. Connect to the broker and declare the topology
    let broker = Arc::new(
        KafkaBroker::builder()
            .brokers(&config.kafka_brokers)
            .timeout(config.publish_timeout)
            .build()
            .expect("failed to create Kafka producer"),
    );
    broker
        .declare_topology(&Topology::standard())
        .await
        .expect("failed to declare broker topology");

    // 5. Start the relay
    let store = PostgresOutboxStore::new(pool);
    let relay = OutboxRelay::new(store, broker.clone(), config.relay_config());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

    tracing::info!(brokers = %config.kafka_brokers, "outbox relay started");

    // 6. Wait for shutdown and drain
    shutdown_signal().await;
    shutdown_tx.send(true).expect("relay task exited early");
    relay_handle.await.expect("relay task panicked");
    broker.close().await;

    tracing::info!("relay worker shut down gracefully");
}
