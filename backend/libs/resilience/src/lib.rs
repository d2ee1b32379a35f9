//! Retry policy execution for Kafka consumers and other at-least-once callers
//!
//! This library provides:
//! - **Retry Executor**: bounded attempts with fixed or exponential backoff,
//!   re-invoking only on failures the caller classifies as retryable
//! - **Recovery Hook**: fired once when attempts run out; it logs and cannot re-raise
//! - **Preset Configurations**: pre-tuned policies (inbound event processing)
//! - **Metrics**: attempt histograms and exhaustion counts behind the `metrics` feature
//!
//! # Example: Inbound Event Processing
//!
//! ```rust,no_run
//! use resilience::{presets, LogRecovery, RetryExecutor, Retryable};
//!
//! #[derive(Debug)]
//! struct Unavailable;
//!
//! impl std::fmt::Display for Unavailable {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "downstream unavailable")
//!     }
//! }
//!
//! impl Retryable for Unavailable {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = RetryExecutor::new(presets::inbound_event_config(), LogRecovery);
//!
//!     let result = executor
//!         .execute(|| async {
//!             // Your processing here
//!             Err::<(), _>(Unavailable)
//!         })
//!         .await;
//! }
//! ```

pub mod metrics;
pub mod presets;
pub mod retry;

// Re-export main types for convenience
pub use presets::inbound_event_config;
pub use retry::{
    with_retry, LogRecovery, RecoveryHook, RetryConfig, RetryError, RetryExecutor, Retryable,
};
