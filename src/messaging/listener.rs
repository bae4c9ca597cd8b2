use std::sync::Arc;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;
use crate::metrics::Metrics;

// ============================================================================
// Queue Listener
// ============================================================================

/// What a listener does with each raw delivery taken off the broker.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), AppError>;
}

/// Subscribes to one queue for the lifetime of the service and feeds every
/// delivery to its handler. A handler failure is fatal to the listener:
/// offsets auto-commit on receive, so a delivery that cannot be persisted
/// is only recovered if the broker redelivers it.
pub struct QueueListener<H> {
    consumer: StreamConsumer,
    topic: String,
    handler: H,
    metrics: Arc<Metrics>,
}

impl<H: MessageHandler> QueueListener<H> {
    pub fn new(
        brokers: &str,
        group: &str,
        topic: &str,
        handler: H,
        metrics: Arc<Metrics>,
    ) -> Result<Self, AppError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            handler,
            metrics,
        })
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<(), AppError> {
        self.consumer.subscribe(&[self.topic.as_str()])?;
        tracing::info!(topic = %self.topic, "consuming queue");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(topic = %self.topic, "listener stopping");
                    return Ok(());
                }
                delivery = self.consumer.recv() => {
                    let msg = delivery?;
                    self.metrics.messages_received.with_label_values(&[&self.topic]).inc();
                    tracing::debug!(
                        topic = %self.topic,
                        offset = msg.offset(),
                        "message received"
                    );

                    self.handler.handle(msg.payload().unwrap_or_default()).await?;
                }
            }
        }
    }
}

/// Durably records every delivery in the inbox table, in its own
/// transaction, before any business processing happens.
pub struct InboxWriter {
    pool: PgPool,
}

impl InboxWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageHandler for InboxWriter {
    async fn handle(&self, payload: &[u8]) -> Result<(), AppError> {
        let message: serde_json::Value = serde_json::from_slice(payload)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO inbox (message) VALUES ($1)")
            .bind(&message)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("message appended to inbox table");
        Ok(())
    }
}
