//! Retry policies for backend calls made through the store.

use std::future::Future;
use std::time::Duration;

use tracing::debug;
use turbo_data::{CancellationToken, ServiceError};

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and max.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u32.saturating_pow(attempt);
                std::cmp::min(base.saturating_mul(multiplier), *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Conditions that trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCondition {
    /// Retry on a specific non-4xx status code.
    StatusCode(u16),
    /// Retry on any 5xx status.
    ServerError,
    /// Retry on timeout.
    Timeout,
    /// Retry on connection error.
    ConnectionError,
}

impl RetryCondition {
    /// Check if an error matches this condition.
    pub fn matches(&self, error: &ServiceError) -> bool {
        match self {
            Self::StatusCode(code) => error.status() == Some(*code),
            Self::ServerError => error.is_server_error(),
            Self::Timeout => matches!(error, ServiceError::Timeout),
            Self::ConnectionError => matches!(error, ServiceError::Transport(_)),
        }
    }
}

/// Retry policy configuration.
///
/// Client errors (4xx, including not-found) and cancellation are never
/// retried, whatever the conditions say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Conditions that trigger retry.
    pub retry_on: Vec<RetryCondition>,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
            retry_on: vec![
                RetryCondition::ServerError,
                RetryCondition::Timeout,
                RetryCondition::ConnectionError,
            ],
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::None,
            retry_on: Vec::new(),
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Set retry conditions.
    pub fn with_conditions(mut self, conditions: Vec<RetryCondition>) -> Self {
        self.retry_on = conditions;
        self
    }

    /// Check if a failed attempt (0-indexed) should be retried.
    pub fn should_retry(&self, error: &ServiceError, attempt: u32) -> bool {
        if attempt >= self.max_attempts || error.is_cancelled() || error.is_client_error() {
            return false;
        }
        self.retry_on.iter().any(|c| c.matches(error))
    }

    /// Run `op` until it succeeds, fails terminally or `cancel` fires.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ServiceError::Cancelled),
                result = op() => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(&error, attempt) => error,
                Err(error) => return Err(error),
            };

            let delay = self.backoff.delay_for_attempt(attempt);
            debug!(attempt, ?delay, %error, "retrying backend call");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
