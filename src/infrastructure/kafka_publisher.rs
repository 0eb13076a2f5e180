use crate::domain::{DomainError, EventPublisher};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use tracing::info;

/// Fire-and-forget Kafka producer. A message counts as published once
/// librdkafka has queued it; broker acknowledgements are not awaited.
#[derive(Clone)]
pub struct KafkaPublisher {
    inner: Arc<FutureProducer>,
}

impl KafkaPublisher {
    pub fn new(brokers: &str) -> Result<Self, DomainError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| {
                DomainError::PublishFailed(format!(
                    "Failed to create Kafka producer for '{}': {}",
                    brokers, e
                ))
            })?;

        info!("Kafka producer created for {}", brokers);
        Ok(Self {
            inner: Arc::new(producer),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, topic: &str, text: &str) -> Result<(), DomainError> {
        let record: FutureRecord<'_, (), str> = FutureRecord::to(topic).payload(text);

        // Only the enqueue result matters; the delivery future is dropped.
        self.inner
            .send_result(record)
            .map(drop)
            .map_err(|(err, _)| {
                DomainError::PublishFailed(format!("Failed to enqueue message on '{}': {}", topic, err))
            })
    }
}
