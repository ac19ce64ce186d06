//! Resilience patterns for calls against remote services
//!
//! Currently provides the retry executor with pluggable backoff, jitter and
//! retry policies. Policies decide per error whether another attempt is
//! worthwhile; [`retry::policies::ClassifiedRetry`] defers to
//! [`crate::error::ErrorClassification`].

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
