//! Queue errors and the shared error cell
//!
//! Remote failures are split in two. Transient ones
//! ([`QueueError::RemoteTransient`]) are retried inside the bridge and only
//! escalate as [`QueueError::RetriesExhausted`] once the attempt budget is
//! spent. Permanent ones surface as [`QueueError::Remote`] straight away.
//!
//! Fatal failures from any task land in an [`ErrorCell`]. Every public
//! operation checks the cell first, so a failure seen by the background
//! collector is reported to the next foreground caller.

use std::time::Duration;

use parking_lot::RwLock;
use spillway_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use spillway_common::impl_error_classification;
use spillway_domain::DomainError;
use thiserror::Error;
use tracing::error;

use crate::remote::ports::RemoteError;

/// Errors surfaced by [`crate::queue::BufferedQueue`] operations
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Couldn't create queue '{name}': {reason}")]
    QueueCreationFailure { name: String, reason: String },

    #[error("Queue is no longer available: {reason}")]
    QueueUnavailable { reason: String, cause: Option<Box<QueueError>> },

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Transient failure during {operation}: {message}")]
    RemoteTransient { operation: &'static str, message: String, retry_after: Option<Duration> },

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { operation: &'static str, attempts: u32, last_error: String },

    #[error("{operation} failed: {source}")]
    Remote { operation: &'static str, source: RemoteError },

    #[error("Overflow blob '{key}' is missing")]
    OverflowMissing { key: String },

    #[error("Codec error: {0}")]
    Codec(String),
}

impl_error_classification!(QueueError, Common,
    Self::InvalidConfiguration(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::QueueCreationFailure { .. } => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::QueueUnavailable { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::QueueEmpty => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::RemoteTransient { retry_after, .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: *retry_after,
    },
    Self::RetriesExhausted { .. } => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::Remote { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::OverflowMissing { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Codec(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

impl QueueError {
    /// Classify a collaborator failure for `operation`
    pub fn from_remote(operation: &'static str, err: RemoteError) -> Self {
        if err.is_retryable() {
            Self::RemoteTransient {
                operation,
                message: err.to_string(),
                retry_after: err.retry_after(),
            }
        } else {
            Self::Remote { operation, source: err }
        }
    }

    /// `QueueUnavailable` without an underlying cause
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::QueueUnavailable { reason: reason.into(), cause: None }
    }
}

impl From<DomainError> for QueueError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Codec(message) => Self::Codec(message),
            other => Self::InvalidConfiguration(other.to_string()),
        }
    }
}

/// Result alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// First fatal error observed by any task of a queue
#[derive(Debug, Default)]
pub struct ErrorCell {
    slot: RwLock<Option<QueueError>>,
}

impl ErrorCell {
    /// Empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `err` unless an earlier error is already recorded.
    /// Returns true when this call recorded it.
    pub fn record(&self, err: QueueError) -> bool {
        let mut slot = self.slot.write();
        if slot.is_some() {
            return false;
        }
        error!(error = %err, severity = %err.severity(), "Recording fatal queue error");
        *slot = Some(err);
        true
    }

    /// Clone of the recorded error, if any
    pub fn get(&self) -> Option<QueueError> {
        self.slot.read().clone()
    }

    /// True once any error was recorded
    pub fn is_set(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Fail with `QueueUnavailable` wrapping the recorded error, if any
    pub fn check(&self) -> QueueResult<()> {
        match self.get() {
            Some(cause) => Err(QueueError::QueueUnavailable {
                reason: cause.to_string(),
                cause: Some(Box::new(cause)),
            }),
            None => Ok(()),
        }
    }
}
