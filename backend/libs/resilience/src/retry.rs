/// Retry policy executor with bounded attempts and a terminal recovery hook
use crate::metrics::RetryMetrics;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Backoff multiplier; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fixed delay between attempts, no jitter
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: delay,
            max_backoff: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay to wait after the `retry`-th failed attempt (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        calculate_backoff(Duration::from_millis(capped as u64), self.jitter)
    }
}

/// Classification the executor uses to decide whether to re-invoke
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors; the recovery hook has run
    #[error("Retries exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
    /// Non-retryable failure, returned on the attempt that produced it
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Hook fired exactly once when attempts are exhausted.
///
/// Returns `()` so it cannot re-raise; the caller treats the work as handled.
pub trait RecoveryHook<E>: Send + Sync {
    fn recover(&self, attempts: u32, last_error: E);
}

/// Default recovery: log the last cause and move on
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecovery;

impl<E: Display> RecoveryHook<E> for LogRecovery {
    fn recover(&self, attempts: u32, last_error: E) {
        warn!(
            attempts = attempts,
            error = %last_error,
            "Retries exhausted, marking as handled"
        );
    }
}

/// Re-invokes an operation while it fails with retryable errors.
#[derive(Debug, Clone)]
pub struct RetryExecutor<H> {
    config: RetryConfig,
    hook: H,
}

impl<H> RetryExecutor<H> {
    pub fn new(config: RetryConfig, hook: H) -> Self {
        Self { config, hook }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `f` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
        H: RecoveryHook<E>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => {
                    RetryMetrics::record_attempts("success", attempt);
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(attempt = attempt, error = %e, "Non-retryable failure");
                    RetryMetrics::record_attempts("failed", attempt);
                    return Err(RetryError::OperationFailed(e));
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        RetryMetrics::record_attempts("exhausted", attempt);
                        RetryMetrics::record_exhausted();
                        self.hook.recover(attempt, e);
                        return Err(RetryError::Exhausted { attempts: attempt });
                    }

                    let delay = self.config.delay_for(attempt - 1);

                    warn!(
                        "Retry attempt {}/{} after {:?}: {}",
                        attempt + 1,
                        max_attempts,
                        delay,
                        e
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Execute a future with retry logic and log-only recovery
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    RetryExecutor::new(config, LogRecovery).execute(f).await
}

fn calculate_backoff(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}
