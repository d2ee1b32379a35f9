pub mod downstream;
pub mod processor;
pub mod publisher;

pub use downstream::{DownstreamGateway, HttpDownstreamGateway};
pub use processor::EventProcessor;
pub use publisher::{KafkaOutboundPublisher, OutboundPublisher};
