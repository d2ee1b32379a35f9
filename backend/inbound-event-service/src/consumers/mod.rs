pub mod inbound_events;

pub use inbound_events::{
    create_consumer, decode_delivery, DeliveryHandler, DeliveryOutcome, ExhaustedDeliveryLog,
    InboundEventsConsumer,
};
