//! Automatic retry with exponential backoff and jitter.
//!
//! Re-issues model calls that fail with a transient [`CallError`] (deadline
//! expiry, empty response, 429/5xx, transport failures). Never retries
//! auth or bad-request errors.

use std::time::Duration;

use tracing::warn;

use crate::api::client::{CallError, ModelClient, complete_with_deadline};
use crate::{ChatCompletion, ChatRequest};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number — avoids
            // pulling in rand just for this.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                3 => 0.85,
                _ => 0.80,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Issue a deadline-bounded model call, retrying transient failures.
///
/// Each attempt gets the full `deadline`; backoff sleeps run between
/// attempts. The last error is returned once `max_retries` is exhausted,
/// and permanent errors are returned immediately.
pub async fn call_with_retry(
    client: &dyn ModelClient,
    request: &ChatRequest,
    deadline: Duration,
    config: &RetryConfig,
) -> Result<ChatCompletion, CallError> {
    let mut attempt: u32 = 0;
    loop {
        match complete_with_deadline(client, request, deadline).await {
            Ok(completion) => return Ok(completion),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "model call failed (attempt {}/{}): {err} — retrying in {:.1}s",
                    attempt + 1,
                    config.max_retries + 1,
                    delay.as_secs_f64(),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
