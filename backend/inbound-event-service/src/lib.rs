//! Inbound Event Service
//!
//! Consumes events from the inbound Kafka topic, calls a third-party HTTP
//! dependency for each new event, forwards the payload to the outbound topic
//! and records the event id so redeliveries are recognised as duplicates.
//!
//! Deduplication is check-then-act: an upfront lookup followed by a
//! conditional insert after the publish. Concurrent deliveries of the same
//! event may both publish; only one of them records the event.

pub mod config;
pub mod consumers;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod services;

pub use config::Config;
pub use consumers::{DeliveryHandler, DeliveryOutcome, ExhaustedDeliveryLog, InboundEventsConsumer};
pub use domain::{InboundDelivery, InboundEvent, OutboundEvent};
pub use error::{DecodeError, DownstreamFailure, ProcessingError, PublishError, ServiceError};
pub use services::{
    DownstreamGateway, EventProcessor, HttpDownstreamGateway, KafkaOutboundPublisher,
    OutboundPublisher,
};
