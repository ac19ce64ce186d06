//! Generic retry executor with backoff, jitter and policy-driven decisions
//!
//! The executor runs an async operation until it succeeds, the policy
//! declines another attempt, the attempt budget is spent, or the optional
//! total time budget runs out. The last error is always handed back to the
//! caller so it can be classified or reported.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },

    /// The retry configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The total time budget ran out before the operation succeeded
    #[error("Retry timeout exceeded after {elapsed:?}")]
    TimeoutExceeded { elapsed: Duration, last_error: Option<E> },
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt, when there was one
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::AttemptsExhausted { last_error, .. } => Some(last_error),
            Self::NonRetryable { source } => Some(source),
            Self::TimeoutExceeded { last_error, .. } => last_error.as_ref(),
            Self::InvalidConfiguration { .. } => None,
        }
    }

    /// Consume the retry error and keep only the underlying operation error
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { last_error, .. } => Some(last_error),
            Self::NonRetryable { source } => Some(source),
            Self::TimeoutExceeded { last_error, .. } => last_error,
            Self::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
    pub elapsed: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }
}

/// Decides whether an error should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is zero-based: 0 is the first failure.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry with the configured backoff delay
    Retry,
    /// Retry after a delay supplied by the error source
    RetryAfter(Duration),
    /// Give up and surface the error
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// `initial_delay * base^attempt`, capped at `max_delay`
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
                let millis = initial_delay.as_millis() as f64 * base.powi(exponent);
                let capped = millis.min(max_delay.as_millis() as f64).max(0.0);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Jitter applied on top of the backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Uniform in `0..=delay`
    Full,
    /// Uniform in `delay/2..=delay`
    Equal,
}

impl Jitter {
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        match self {
            Self::None => delay,
            Self::Full => Duration::from_millis(rng.gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rng.gen_range(0..=millis - half))
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: Jitter,
    /// Upper bound on wall-clock time across all attempts
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(100),
                base: 2.0,
                max_delay: Duration::from_secs(30),
            },
            jitter: Jitter::Equal,
            max_total_time: None,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        if let BackoffStrategy::Exponential { base, initial_delay, max_delay } = &self.backoff {
            if *base <= 0.0 {
                return Err(RetryError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
            if initial_delay > max_delay {
                return Err(RetryError::InvalidConfiguration {
                    message: format!(
                        "initial delay ({initial_delay:?}) cannot exceed max delay ({max_delay:?})"
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn full_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Full;
        self
    }

    pub fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs operations under a [`RetryConfig`] and a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut total_delay = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            debug!(attempt = attempt_number, max_attempts = self.config.max_attempts, "Executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt_number,
                        total_delay,
                        elapsed: started.elapsed(),
                    };
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(error = %error, "Retry policy declined another attempt");
                    return RetryOutcome {
                        result: Err(RetryError::NonRetryable { source: error }),
                        attempts: attempt_number,
                        total_delay,
                        elapsed: started.elapsed(),
                    };
                }
                RetryDecision::Retry => {
                    self.config.jitter.apply(self.config.backoff.calculate_delay(attempt))
                }
                RetryDecision::RetryAfter(custom) => custom,
            };

            if attempt_number >= self.config.max_attempts {
                warn!(attempts = attempt_number, error = %error, "All retry attempts exhausted");
                return RetryOutcome {
                    result: Err(RetryError::AttemptsExhausted {
                        attempts: attempt_number,
                        last_error: error,
                    }),
                    attempts: attempt_number,
                    total_delay,
                    elapsed: started.elapsed(),
                };
            }

            if let Some(max_time) = self.config.max_total_time {
                let elapsed = started.elapsed();
                if elapsed + delay >= max_time {
                    warn!(elapsed = ?elapsed, attempts = attempt_number, "Retry time budget exceeded");
                    return RetryOutcome {
                        result: Err(RetryError::TimeoutExceeded {
                            elapsed,
                            last_error: Some(error),
                        }),
                        attempts: attempt_number,
                        total_delay,
                        elapsed,
                    };
                }
            }

            warn!(attempt = attempt_number, delay = ?delay, error = %error, "Operation failed, retrying");
            tokio::time::sleep(delay).await;
            total_delay += delay;
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};
    use crate::error::ErrorClassification;

    /// Retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries while the predicate returns true
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    /// Retries errors classified as retryable, honouring `retry_after`
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            match error.retry_after() {
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            }
        }
    }
}
