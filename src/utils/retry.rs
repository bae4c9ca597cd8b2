use std::time::Duration;

use tokio::time::sleep;

// ============================================================================
// Bounded Retry with Exponential Backoff
// ============================================================================
//
// Used for startup-time infrastructure connections (database, broker).
// A running worker never retries through this helper: its sole retry
// mechanism is the next tick of its own loop.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry profile for startup connections: services come up in arbitrary
    /// order, so the first attempts routinely fail.
    pub fn startup() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Execute an operation with exponential backoff, returning the last error
/// once all attempts are exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt,
                        error = %error,
                        "operation failed after all retries"
                    );
                    return Err(error);
                }

                tracing::warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying after delay"
                );

                sleep(delay).await;

                delay = Duration::from_millis(((delay.as_millis() as f64) * config.multiplier) as u64);
                delay = delay.min(config.max_delay);
            }
        }
    }
}
