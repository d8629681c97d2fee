//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use outbox::RelayConfig;

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — Postgres connection string (required)
/// - `KAFKA_BROKERS` — comma-separated bootstrap list (default: `"localhost:9092"`)
/// - `METRICS_ADDR` — Prometheus listen address (default: `"0.0.0.0:9090"`)
/// - `OUTBOX_POLL_INTERVAL_MS` — pause between drain cycles (default: `1000`)
/// - `OUTBOX_BATCH_SIZE` — entries fetched per cycle (default: `100`)
/// - `OUTBOX_MAX_ATTEMPTS` — attempts before dead-lettering (default: `8`)
/// - `PUBLISH_TIMEOUT_MS` — broker publish timeout (default: `5000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub kafka_brokers: String,
    pub metrics_addr: SocketAddr,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub publish_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults. Fails only when `DATABASE_URL` is missing or an override
    /// does not parse.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;

        Ok(Self {
            database_url,
            kafka_brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            metrics_addr: parse_var("METRICS_ADDR", "0.0.0.0:9090".parse().map_err(err)?)?,
            poll_interval: Duration::from_millis(parse_var("OUTBOX_POLL_INTERVAL_MS", 1000)?),
            batch_size: parse_var("OUTBOX_BATCH_SIZE", 100)?,
            max_attempts: parse_var("OUTBOX_MAX_ATTEMPTS", 8)?,
            publish_timeout: Duration::from_millis(parse_var("PUBLISH_TIMEOUT_MS", 5000)?),
        })
    }

    /// The relay tuning derived from this configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            ..RelayConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|e| format!("invalid {name}: {e}")),
        Err(_) => Ok(default),
    }
}

fn err(e: impl std::fmt::Display) -> String {
    e.to_string()
}
