use crate::config::KafkaConfig;
use crate::domain::OutboundEvent;
use crate::error::PublishError;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, error};

/// Emits outbound events keyed by the inbound message key
#[async_trait]
pub trait OutboundPublisher: Send + Sync {
    /// Send `payload` under `key` and wait for the broker acknowledgement.
    async fn publish(&self, key: &str, payload: &str) -> Result<(), PublishError>;
}

/// Build a producer for the outbound topic.
///
/// Idempotence and `acks=all` keep broker-side retries from duplicating a
/// record; they do nothing about a record published twice by two deliveries.
pub fn create_producer(config: &KafkaConfig) -> Result<FutureProducer, PublishError> {
    let producer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("enable.idempotence", "true")
        .set("acks", "all")
        .set("max.in.flight.requests.per.connection", "5")
        .set(
            "message.timeout.ms",
            config.delivery_timeout.as_millis().to_string(),
        )
        .create()?;

    Ok(producer)
}

pub struct KafkaOutboundPublisher {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaOutboundPublisher {
    pub fn new(producer: FutureProducer, topic: impl Into<String>, delivery_timeout: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            delivery_timeout,
        }
    }

    fn encode(payload: &str) -> Result<String, PublishError> {
        let event = OutboundEvent {
            data: payload.to_string(),
        };
        Ok(serde_json::to_string(&event)?)
    }
}

#[async_trait]
impl OutboundPublisher for KafkaOutboundPublisher {
    async fn publish(&self, key: &str, payload: &str) -> Result<(), PublishError> {
        let body = Self::encode(payload)?;
        let record = FutureRecord::to(&self.topic).key(key).payload(&body);

        let (partition, offset) = self
            .producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(err, _)| {
                error!(key = %key, topic = %self.topic, error = %err, "Kafka publish failed");
                PublishError::Kafka(err)
            })?;

        debug!(
            key = %key,
            topic = %self.topic,
            partition = partition,
            offset = offset,
            "Outbound event published"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wraps_payload() {
        let body = KafkaOutboundPublisher::encode("hello").unwrap();
        assert_eq!(body, r#"{"data":"hello"}"#);
    }

    #[test]
    fn test_encode_escapes_payload() {
        let body = KafkaOutboundPublisher::encode(r#"say "hi""#).unwrap();
        let decoded: OutboundEvent = serde_json::from_str(&body).unwrap();
        assert_eq!(decoded.data, r#"say "hi""#);
    }

    fn kafka_config(brokers: &str, delivery_timeout: Duration) -> KafkaConfig {
        KafkaConfig {
            brokers: brokers.to_string(),
            group_id: "demo-kafka".to_string(),
            inbound_topic: "demo-inbound-topic".to_string(),
            outbound_topic: "demo-outbound-topic".to_string(),
            event_id_header: "demo_eventIdHeader".to_string(),
            max_poll_interval: Duration::from_millis(300_000),
            delivery_timeout,
        }
    }

    #[test]
    fn test_create_producer_without_broker_connection() {
        // Creating a producer does not contact the brokers
        let config = kafka_config("localhost:9092", Duration::from_secs(30));
        assert!(create_producer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_broker_surfaces_kafka_error() {
        let config = kafka_config("127.0.0.1:1", Duration::from_millis(500));
        let producer = create_producer(&config).unwrap();
        let publisher = KafkaOutboundPublisher::new(
            producer,
            config.outbound_topic.clone(),
            config.delivery_timeout,
        );

        let result = tokio::time::timeout(Duration::from_secs(30), publisher.publish("K1", "hello"))
            .await
            .expect("message timeout should fail the send first");

        assert!(matches!(result, Err(PublishError::Kafka(_))));
    }
}
