/// Prometheus metrics for the retry executor
#[cfg(feature = "metrics")]
use prometheus::{register_histogram_vec, register_int_counter, HistogramVec, IntCounter};

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;

#[cfg(feature = "metrics")]
static RETRY_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "resilience_retry_attempts",
        "Number of attempts before success, failure or exhaustion",
        &["result"],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 13.0]
    )
    .expect("Failed to register retry attempts metric")
});

#[cfg(feature = "metrics")]
static RETRY_EXHAUSTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "resilience_retry_exhausted_total",
        "Operations handed to the recovery hook after the last attempt"
    )
    .expect("Failed to register retry exhausted metric")
});

/// Metrics collector for retries
#[cfg(feature = "metrics")]
pub struct RetryMetrics;

#[cfg(feature = "metrics")]
impl RetryMetrics {
    pub fn record_attempts(result: &str, attempts: u32) {
        RETRY_ATTEMPTS
            .with_label_values(&[result])
            .observe(attempts as f64);
    }

    pub fn record_exhausted() {
        RETRY_EXHAUSTED.inc();
    }
}

// No-op implementation when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub struct RetryMetrics;

#[cfg(not(feature = "metrics"))]
impl RetryMetrics {
    pub fn record_attempts(_result: &str, _attempts: u32) {}
    pub fn record_exhausted() {}
}
