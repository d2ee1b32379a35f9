use serde::{Deserialize, Serialize};

/// Body of a message on the inbound topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Opaque payload, forwarded unchanged to the outbound topic
    pub data: String,
}

impl InboundEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// One delivery of an inbound event as handed over by the transport.
///
/// `event_id` comes from message metadata (a header), never from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDelivery {
    pub event_id: String,
    pub key: String,
    pub event: InboundEvent,
}

/// Body of a message emitted on the outbound topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub data: String,
}
