//! Port interfaces for the remote queue service and the overflow blob store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use spillway_common::error::{CommonError, ErrorSeverity};
use spillway_common::impl_error_classification;
use spillway_domain::{ReceiptHandle, ReceivedMessage};
use thiserror::Error;

/// Failures reported by remote collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request throttled")]
    Throttled { retry_after: Option<Duration> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl_error_classification!(RemoteError, Common,
    Self::Unavailable(_) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Throttled { retry_after } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: *retry_after,
    },
    Self::NotFound(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::Rejected(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

/// Result alias for port calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// An entry of a batch request the service refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Position in the submitted batch
    pub index: usize,
    /// Service-provided reason
    pub message: String,
}

/// Attributes applied when creating a queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Service default when `None`
    pub visibility_timeout_secs: Option<u32>,
}

/// Handle to one remote queue
#[async_trait]
pub trait RemoteQueue: Send + Sync {
    /// Queue URL as issued by the service
    async fn url(&self) -> RemoteResult<String>;

    /// Send up to 10 bodies; returns the entries that were not accepted
    async fn send_batch(&self, bodies: &[String]) -> RemoteResult<Vec<BatchFailure>>;

    /// Receive up to `max` (at most 10) messages, hiding them for the
    /// visibility timeout
    async fn receive_batch(&self, max: usize) -> RemoteResult<Vec<ReceivedMessage>>;

    /// Delete up to 10 messages; returns the entries that were not deleted
    async fn delete_batch(&self, receipts: &[ReceiptHandle]) -> RemoteResult<Vec<BatchFailure>>;

    /// Eventually consistent count of visible messages
    async fn approximate_count(&self) -> RemoteResult<u64>;

    async fn delete_queue(&self) -> RemoteResult<()>;
}

/// Queue service used to locate or create queues by name
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn find_queue(&self, name: &str) -> RemoteResult<Option<Arc<dyn RemoteQueue>>>;

    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
    ) -> RemoteResult<Arc<dyn RemoteQueue>>;
}

/// Content-addressed blob container holding oversized payloads
#[async_trait]
pub trait OverflowStore: Send + Sync {
    async fn exists(&self, key: &str) -> RemoteResult<bool>;

    async fn put(&self, key: &str, payload: &[u8]) -> RemoteResult<()>;

    /// `None` when no blob is stored under `key`
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Deleting a missing key succeeds
    async fn delete(&self, key: &str) -> RemoteResult<()>;

    /// Remove the container and everything in it
    async fn delete_container(&self) -> RemoteResult<()>;
}

/// Blob service that hands out one container per queue
#[async_trait]
pub trait BlobService: Send + Sync {
    /// Open the container, creating it when absent
    async fn open_container(&self, name: &str) -> RemoteResult<Arc<dyn OverflowStore>>;
}

#[cfg(test)]
mod tests {
    use spillway_common::error::ErrorClassification;

    use super::*;

    #[test]
    fn test_remote_error_classification() {
        assert!(RemoteError::Unavailable("503".into()).is_retryable());
        assert!(!RemoteError::Rejected("bad body".into()).is_retryable());
        assert!(!RemoteError::NotFound("queue".into()).is_retryable());

        let throttled = RemoteError::Throttled { retry_after: Some(Duration::from_millis(40)) };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.retry_after(), Some(Duration::from_millis(40)));

        let wrapped = RemoteError::from(CommonError::timeout("receive", Duration::from_secs(1)));
        assert!(wrapped.is_retryable());
    }
}
