//! Retry with exponential backoff and jitter for transient LLM failures.
//!
//! Only errors classified transient by [`LlmError::is_transient`] are
//! retried; permanent failures surface immediately. Once attempts are
//! exhausted the last error is returned unchanged.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::LlmError;

/// Backoff policy for one category of calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    pub base_delay: f64,
    /// Upper bound on any single delay, in seconds.
    pub max_delay: f64,
    /// Growth factor between attempts.
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), jittered.
    ///
    /// The raw exponential value is capped at `max_delay`, then scaled by
    /// a random factor in `[0.5, 1.0)` so concurrent callers spread out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * self.exponential_base.powi(attempt as i32);
        let capped = exp.min(self.max_delay);
        let jitter = 0.5 + rand::thread_rng().gen::<f64>() * 0.5;
        Duration::from_secs_f64(capped * jitter)
    }
}

/// Run `operation` with retry on transient failures.
///
/// `operation` is a factory producing a fresh future per attempt.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = operation_name, attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                last_error = Some(err);
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation = operation_name,
                        attempts = config.max_attempts,
                        error = %err,
                        "retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        operation = operation_name,
                        error = %err,
                        "permanent failure, not retrying"
                    );
                }
                return Err(err);
            }
        }
    }

    // Unreachable with max_attempts >= 1, but keep a sane fallback.
    Err(last_error.unwrap_or_else(|| LlmError::Service("no attempts configured".into())))
}
