/// Preset retry policies
use crate::retry::RetryConfig;
use std::time::Duration;

/// Attempts per inbound delivery, the first one included
pub const INBOUND_EVENT_MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between inbound delivery attempts
pub const INBOUND_EVENT_BACKOFF: Duration = Duration::from_millis(6000);

/// Inbound Kafka event processing
///
/// - 5 attempts in total
/// - Fixed 6s backoff, no jitter
pub fn inbound_event_config() -> RetryConfig {
    RetryConfig::fixed(INBOUND_EVENT_MAX_ATTEMPTS, INBOUND_EVENT_BACKOFF)
}
