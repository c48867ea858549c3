//! Exponential-backoff retry and model fallback for provider calls

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::providers::{AiProvider, Completion, CompletionRequest, ProviderError};

/// Retry policy for a single model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Calls per model, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 25% of the base delay at random
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff plus jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if !self.jitter || self.base_delay.is_zero() {
            return delay;
        }
        let max_jitter = self.base_delay.as_millis() as u64 / 4;
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
    }
}

/// Try each model in order, retrying transient failures
///
/// Retryable errors are retried up to `policy.max_attempts` times per model.
/// An unavailable model, an unusable response or exhausted retries move on
/// to the next model. Authentication and configuration errors stop at once.
/// The last error is returned when every model fails.
pub async fn complete_with_fallback<P>(
    provider: &P,
    models: &[&str],
    prompt: &str,
    max_tokens: u32,
    policy: &RetryPolicy,
) -> Result<Completion, ProviderError>
where
    P: AiProvider + ?Sized,
{
    let mut last_error = ProviderError::ModelUnavailable(format!("{} has no models", provider.kind()));
    let attempts = policy.max_attempts.max(1);

    for model in models {
        let request = CompletionRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            max_tokens,
        };

        for attempt in 0..attempts {
            match provider.complete(&request).await {
                Ok(completion) => {
                    debug!("{} answered with model {} on attempt {}", provider.kind(), model, attempt + 1);
                    return Ok(completion);
                }
                Err(e @ (ProviderError::Auth(_) | ProviderError::NotConfigured(_))) => {
                    warn!("{} rejected the request: {}", provider.kind(), e);
                    return Err(e);
                }
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = policy.delay_for(attempt);
                    debug!(
                        "{} model {} failed ({}), retrying in {:?}",
                        provider.kind(),
                        model,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    last_error = e;
                }
                Err(e) => {
                    warn!("{} model {} failed: {}", provider.kind(), model, e);
                    last_error = e;
                    break;
                }
            }
        }
    }

    Err(last_error)
}
