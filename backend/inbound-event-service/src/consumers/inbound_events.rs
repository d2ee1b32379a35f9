//! Inbound Events Consumer
//!
//! Consumes the inbound topic, hands every delivery to the retry executor
//! wrapping the event processor, and commits the offset once the delivery
//! has a final outcome. Fatal and exhausted deliveries are logged and
//! committed; nothing is parked for later.

use crate::config::KafkaConfig;
use crate::domain::{InboundDelivery, InboundEvent};
use crate::error::{DecodeError, ProcessingError, Result};
use crate::metrics;
use crate::services::{DownstreamGateway, EventProcessor, OutboundPublisher};
use idempotent_consumer::DedupStore;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use resilience::{RecoveryHook, RetryError, RetryExecutor};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Final outcome of one delivery, after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Processed,
    Duplicate,
    /// Fatal failure; logged and committed
    Dropped,
    /// Retryable failures used up every attempt; the recovery hook ran
    Exhausted { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Processed => "success",
            DeliveryOutcome::Duplicate => "duplicate",
            DeliveryOutcome::Dropped => "fatal",
            DeliveryOutcome::Exhausted { .. } => "retryable",
        }
    }
}

/// Runs the processor for one delivery under the retry policy
pub struct DeliveryHandler<S, G, P, H> {
    processor: EventProcessor<S, G, P>,
    retry: RetryExecutor<H>,
}

impl<S, G, P, H> DeliveryHandler<S, G, P, H>
where
    S: DedupStore,
    G: DownstreamGateway,
    P: OutboundPublisher,
    H: RecoveryHook<ProcessingError>,
{
    pub fn new(processor: EventProcessor<S, G, P>, retry: RetryExecutor<H>) -> Self {
        Self { processor, retry }
    }

    pub async fn handle(&self, delivery: &InboundDelivery) -> DeliveryOutcome {
        let started = Instant::now();
        let processor = &self.processor;

        let result = self
            .retry
            .execute(move || processor.process(&delivery.event_id, &delivery.key, &delivery.event))
            .await;

        let outcome = match result {
            Ok(()) => DeliveryOutcome::Processed,
            Err(RetryError::OperationFailed(e)) if e.is_duplicate() => {
                debug!(event_id = %delivery.event_id, "Delivery skipped as duplicate");
                DeliveryOutcome::Duplicate
            }
            Err(RetryError::OperationFailed(e)) => {
                error!(
                    event_id = %delivery.event_id,
                    key = %delivery.key,
                    error = %e,
                    "Dropping event after fatal failure"
                );
                DeliveryOutcome::Dropped
            }
            Err(RetryError::Exhausted { attempts }) => DeliveryOutcome::Exhausted { attempts },
        };

        metrics::observe_delivery(outcome.as_label(), started.elapsed());
        outcome
    }
}

/// Recovery hook for deliveries whose retries ran out
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustedDeliveryLog;

impl RecoveryHook<ProcessingError> for ExhaustedDeliveryLog {
    fn recover(&self, attempts: u32, last_error: ProcessingError) {
        warn!(
            attempts = attempts,
            error = %last_error,
            "Retries exhausted, committing delivery without processing"
        );
    }
}

/// Turn raw record parts into a delivery.
///
/// `event_id` is the value of the configured header, `header_name` is only
/// used for the error message.
pub fn decode_delivery(
    event_id: Option<&[u8]>,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
    header_name: &str,
) -> std::result::Result<InboundDelivery, DecodeError> {
    let event_id = event_id.ok_or_else(|| DecodeError::MissingEventId(header_name.to_string()))?;
    let event_id = std::str::from_utf8(event_id).map_err(|_| DecodeError::InvalidUtf8("event_id"))?;

    let key = key.ok_or(DecodeError::MissingKey)?;
    let key = std::str::from_utf8(key).map_err(|_| DecodeError::InvalidUtf8("key"))?;

    let payload = payload.ok_or(DecodeError::MissingPayload)?;
    let event: InboundEvent = serde_json::from_slice(payload)?;

    Ok(InboundDelivery {
        event_id: event_id.to_string(),
        key: key.to_string(),
        event,
    })
}

/// Build the inbound consumer. Offsets are committed manually.
pub fn create_consumer(config: &KafkaConfig) -> Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "45000")
        .set(
            "max.poll.interval.ms",
            config.max_poll_interval.as_millis().to_string(),
        )
        .create()?;

    consumer.subscribe(&[&config.inbound_topic])?;
    Ok(consumer)
}

pub struct InboundEventsConsumer<S, G, P, H> {
    consumer: StreamConsumer,
    handler: DeliveryHandler<S, G, P, H>,
    event_id_header: String,
}

impl<S, G, P, H> InboundEventsConsumer<S, G, P, H>
where
    S: DedupStore,
    G: DownstreamGateway,
    P: OutboundPublisher,
    H: RecoveryHook<ProcessingError>,
{
    pub fn new(
        consumer: StreamConsumer,
        handler: DeliveryHandler<S, G, P, H>,
        event_id_header: impl Into<String>,
    ) -> Self {
        Self {
            consumer,
            handler,
            event_id_header: event_id_header.into(),
        }
    }

    /// Run the consumer loop until the task is dropped
    pub async fn run(self) {
        info!(header = %self.event_id_header, "Starting inbound events consumer");

        loop {
            match self.consumer.recv().await {
                Ok(record) => {
                    self.handle_record(&record).await;

                    if let Err(commit_err) = self.consumer.commit_message(&record, CommitMode::Async)
                    {
                        warn!("Failed to commit Kafka offset: {}", commit_err);
                    }
                }
                Err(err) => {
                    error!("Kafka error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn handle_record(&self, record: &BorrowedMessage<'_>) {
        let event_id = header_value(record, &self.event_id_header);

        match decode_delivery(event_id, record.key(), record.payload(), &self.event_id_header) {
            Ok(delivery) => {
                debug!(
                    event_id = %delivery.event_id,
                    key = %delivery.key,
                    partition = record.partition(),
                    offset = record.offset(),
                    "Received inbound event"
                );
                self.handler.handle(&delivery).await;
            }
            Err(e) => {
                error!(
                    topic = %record.topic(),
                    partition = record.partition(),
                    offset = record.offset(),
                    error = %e,
                    "Dropping undecodable inbound record"
                );
                metrics::observe_delivery(DeliveryOutcome::Dropped.as_label(), Duration::ZERO);
            }
        }
    }
}

fn header_value<'a>(message: &'a BorrowedMessage<'a>, key: &str) -> Option<&'a [u8]> {
    message.headers().and_then(|headers| {
        headers
            .iter()
            .find(|header| header.key == key)
            .and_then(|header| header.value)
    })
}
