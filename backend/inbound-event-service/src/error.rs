/// Error types for inbound-event-service
use idempotent_consumer::DedupError;
use thiserror::Error;

/// Classified failure of a downstream call.
///
/// Success is `Ok(())`; the two variants decide whether the delivery is retried.
#[derive(Error, Debug)]
pub enum DownstreamFailure {
    /// Dependency transiently unavailable (5xx, timeout, connection or read failure)
    #[error("Downstream temporarily unavailable: {0:#}")]
    Retryable(anyhow::Error),

    /// Contract violation or unexpected error; retrying will not help
    #[error("Downstream call failed: {0:#}")]
    Fatal(anyhow::Error),
}

impl DownstreamFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DownstreamFailure::Retryable(_))
    }
}

/// Non-200 status returned by the downstream dependency
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Thirdparty api returned status {status}")]
pub struct UnexpectedStatus {
    pub status: u16,
}

/// Failure handing an outbound event to the transport
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Kafka publish failed: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// Outcome of one `process` invocation other than success
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Already handled by an earlier delivery or a concurrent one. Not a failure.
    #[error("Duplicate event Id: {event_id}")]
    Duplicate { event_id: String },

    /// Transient condition; the retry executor may re-invoke `process`
    #[error("Retryable processing failure: {0:#}")]
    Retryable(anyhow::Error),

    /// Terminal for this delivery; logged, never retried
    #[error("Fatal processing failure: {0:#}")]
    Fatal(anyhow::Error),
}

impl ProcessingError {
    pub fn duplicate(event_id: &str) -> Self {
        ProcessingError::Duplicate {
            event_id: event_id.to_string(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ProcessingError::Duplicate { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessingError::Fatal(_))
    }

    /// Classify a dedup store failure that is not an `AlreadyExists`
    pub fn from_store(err: DedupError) -> Self {
        if err.is_transient() {
            ProcessingError::Retryable(err.into())
        } else {
            ProcessingError::Fatal(err.into())
        }
    }
}

impl From<DownstreamFailure> for ProcessingError {
    fn from(failure: DownstreamFailure) -> Self {
        match failure {
            DownstreamFailure::Retryable(cause) => ProcessingError::Retryable(cause),
            DownstreamFailure::Fatal(cause) => ProcessingError::Fatal(cause),
        }
    }
}

impl resilience::Retryable for ProcessingError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProcessingError::Retryable(_))
    }
}

/// A Kafka record that cannot be turned into an inbound delivery
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Missing event id header: {0}")]
    MissingEventId(String),

    #[error("Missing message key")]
    MissingKey,

    #[error("Missing message payload")]
    MissingPayload,

    #[error("Field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("Invalid inbound event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Startup and transport-level errors of the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
