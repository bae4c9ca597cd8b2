use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

// ============================================================================
// Environment-driven configuration
// ============================================================================

/// Tick period and batch limit shared by the outbox and inbox workers.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub period: Duration,
    pub batch_size: i64,
}

impl WorkerConfig {
    /// Reads `{prefix}_PERIOD_MS` and `{prefix}_BATCH_SIZE`, falling back to
    /// one second and ten rows.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let period = duration_ms(
            env::var(format!("{prefix}_PERIOD_MS")).ok(),
            Duration::from_secs(1),
        )?;
        let batch_size = integer(env::var(format!("{prefix}_BATCH_SIZE")).ok(), 10)?;

        Ok(Self { period, batch_size })
    }
}

/// Configuration shared by the order and payment service binaries.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub pg_conn_string: String,
    pub kafka_brokers: String,
    pub http_addr: String,
    pub outbox: WorkerConfig,
    pub inbox: WorkerConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            pg_conn_string: required("PG_CONN_STRING")?,
            kafka_brokers: required("KAFKA_BROKERS")?,
            http_addr: env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            outbox: WorkerConfig::from_env("OUTBOX")?,
            inbox: WorkerConfig::from_env("INBOX")?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub http_addr: String,
    pub order_url: String,
    pub payment_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_addr: env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            order_url: required("ORDER_URL")?,
            payment_url: required("PAYMENT_URL")?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} environment variable is not set"))
}

fn duration_ms(raw: Option<String>, default: Duration) -> Result<Duration> {
    match raw {
        Some(value) => {
            let ms: u64 = value
                .parse()
                .with_context(|| format!("invalid millisecond value: {value}"))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}

fn integer(raw: Option<String>, default: i64) -> Result<i64> {
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid integer value: {value}")),
        None => Ok(default),
    }
}
