pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod rest;
pub mod services;
pub mod storage;
pub mod utils;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize structured logging with environment-based filtering.
/// Default to INFO level, can be overridden with RUST_LOG env var.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_saga=debug")),
        )
        .init();
}
