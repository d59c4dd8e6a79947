/*!
 * Retry logic with exponential backoff
 */

use rand::Rng;
use std::time::Duration;
use tracing::warn;

use crate::config::FerryConfig;
use crate::error::{FerryError, Result};

/// Cap on the backoff exponent, so the delay cannot overflow
const MAX_BACKOFF_SHIFT: u32 = 16;

/// How transient fetch and send failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure (0 = fail immediately)
    pub attempts: u32,
    pub delay: Duration,
    pub exponential: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &FerryConfig) -> Self {
        Self {
            attempts: config.retry_attempts,
            delay: Duration::from_secs(config.retry_delay_secs),
            exponential: config.exponential_backoff,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
            exponential: false,
        }
    }

    /// Base delay before retry number `attempt` (1-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if !self.exponential || attempt <= 1 {
            return self.delay;
        }
        let shift = (attempt - 1).min(MAX_BACKOFF_SHIFT);
        self.delay.saturating_mul(1 << shift)
    }

    /// Base delay plus up to a quarter of it in random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let max_jitter = (base.as_millis() / 4) as u64;
        if max_jitter == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=max_jitter);
        base + Duration::from_millis(jitter)
    }

    /// Start tracking retries for one operation
    pub fn begin(&self, operation: &'static str) -> Retry<'_> {
        Retry {
            policy: self,
            operation,
            attempt: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Retry state of one operation.
///
/// ```ignore
/// let mut retry = policy.begin("fetch");
/// let next = loop {
///     match source.next().await {
///         Ok(next) => break next,
///         Err(e) => retry.backoff(e).await?,
///     }
/// };
/// ```
#[derive(Debug)]
pub struct Retry<'a> {
    policy: &'a RetryPolicy,
    operation: &'static str,
    attempt: u32,
}

impl Retry<'_> {
    /// Sleep before the next attempt, or give `err` back when it is not
    /// transient or the attempts are used up.
    pub async fn backoff(&mut self, err: FerryError) -> Result<()> {
        if !err.is_transient() || self.attempt >= self.policy.attempts {
            return Err(err);
        }
        self.attempt += 1;

        let delay = self.policy.delay_for(self.attempt);
        warn!(
            operation = self.operation,
            attempt = self.attempt,
            max_attempts = self.policy.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient failure"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Retries made so far
    pub fn retries(&self) -> u32 {
        self.attempt
    }
}
