use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::errors::AppError;

// ============================================================================
// Event Publisher
// ============================================================================

/// The capability the outbox worker needs from the broker side: serialize
/// and send a batch of events to the worker's destination queue.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Sends events one by one and returns the first failure. Events sent
    /// before the failing one are already on the wire; the caller's
    /// transaction rollback cannot un-send them, which is where duplicate
    /// delivery comes from.
    async fn publish(&self, events: &[serde_json::Value]) -> Result<(), AppError>;
}

/// Publishes JSON events to a single Kafka topic.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, AppError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, events: &[serde_json::Value]) -> Result<(), AppError> {
        for event in events {
            let body = serde_json::to_string(event)?;

            let record = FutureRecord::<(), _>::to(&self.topic)
                .payload(&body)
                .timestamp(Utc::now().timestamp_millis())
                .headers(OwnedHeaders::new().insert(Header {
                    key: "content-type",
                    value: Some("application/json"),
                }));

            self.producer
                .send(record, Timeout::After(Duration::from_secs(5)))
                .await
                .map_err(|(e, _)| AppError::Broker(e))?;

            tracing::debug!(topic = %self.topic, "event published");
        }

        Ok(())
    }
}
