//! Event processor
//!
//! Runs the check-then-act pipeline for one delivery:
//!
//! 1. `exists(event_id)`: already recorded → `Duplicate`
//! 2. downstream call with the message key
//! 3. publish `(key, data)` to the outbound topic
//! 4. `record_if_absent(event_id)`: lost the insert → `Duplicate`
//!
//! Only step 4 is a correctness boundary. Two deliveries of the same event
//! can both pass step 1 before either reaches step 4; both then publish and
//! exactly one wins the insert. Retries are owned by the caller, never by
//! this type.

use crate::domain::InboundEvent;
use crate::error::ProcessingError;
use crate::services::{DownstreamGateway, OutboundPublisher};
use idempotent_consumer::DedupStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct EventProcessor<S, G, P> {
    store: Arc<S>,
    gateway: Arc<G>,
    publisher: Arc<P>,
}

impl<S, G, P> Clone for EventProcessor<S, G, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S, G, P> EventProcessor<S, G, P>
where
    S: DedupStore,
    G: DownstreamGateway,
    P: OutboundPublisher,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, publisher: Arc<P>) -> Self {
        Self {
            store,
            gateway,
            publisher,
        }
    }

    /// Process one delivery of an inbound event.
    ///
    /// `Ok(())` means the event was forwarded and recorded by this call.
    pub async fn process(
        &self,
        event_id: &str,
        key: &str,
        event: &InboundEvent,
    ) -> Result<(), ProcessingError> {
        let seen = self.store.exists(event_id).await.map_err(|e| {
            error!(event_id = %event_id, error = %e, "Dedup lookup failed");
            ProcessingError::from_store(e)
        })?;

        if seen {
            info!(event_id = %event_id, "Duplicate event received");
            return Err(ProcessingError::duplicate(event_id));
        }

        self.gateway.invoke(key).await?;

        self.publisher
            .publish(key, &event.data)
            .await
            .map_err(|e| {
                error!(event_id = %event_id, key = %key, error = %e, "Failed to publish outbound event");
                ProcessingError::Fatal(e.into())
            })?;

        match self.store.record_if_absent(event_id).await {
            Ok(()) => {
                debug!(event_id = %event_id, "Event persisted");
                info!(event_id = %event_id, key = %key, "Event processed");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                warn!(
                    event_id = %event_id,
                    key = %key,
                    "Event recorded concurrently after publish; outbound event may be duplicated"
                );
                Err(ProcessingError::duplicate(event_id))
            }
            Err(e) => {
                error!(event_id = %event_id, error = %e, "Failed to record processed event");
                Err(ProcessingError::from_store(e))
            }
        }
    }
}
