use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spillway_core::queue::BufferedQueue;
use spillway_domain::{QueueOptions, RetryOptions};
use spillway_infra::memory::{
    InMemoryBlobService, InMemoryBlobStore, InMemoryQueue, InMemoryQueueService,
};

pub const QUEUE_NAME: &str = "integration";

/// Options tuned for tests: three attempts per call class, millisecond
/// backoff and short polling intervals.
pub fn fast_options(buffer_size: usize) -> QueueOptions {
    QueueOptions::new(buffer_size)
        .with_name(QUEUE_NAME)
        .with_retry(RetryOptions { base_delay_ms: 1, max_delay_ms: 5, ..RetryOptions::uniform(3) })
        .with_idle_poll_interval(Duration::from_millis(20))
        .with_collector_interval(Duration::from_millis(10))
        .with_recreate_delay(Duration::from_millis(10))
}

/// A buffered queue wired to fresh in-memory services
pub struct Harness {
    pub queues: Arc<InMemoryQueueService>,
    pub blobs: Arc<InMemoryBlobService>,
    pub queue: Arc<BufferedQueue>,
}

impl Harness {
    pub async fn connect(options: QueueOptions) -> Self {
        Self::connect_with(Arc::new(InMemoryQueueService::new()), options).await
    }

    pub async fn connect_with(queues: Arc<InMemoryQueueService>, options: QueueOptions) -> Self {
        let blobs = Arc::new(InMemoryBlobService::new());
        let queue = BufferedQueue::connect(&options, queues.as_ref(), blobs.as_ref())
            .await
            .expect("queue should connect");
        Self { queues, blobs, queue: Arc::new(queue) }
    }

    /// The remote queue behind the facade
    pub fn remote(&self) -> Arc<InMemoryQueue> {
        self.queues.queue(self.queue.name()).expect("remote queue should exist")
    }

    /// The overflow container behind the facade
    pub fn store(&self) -> Arc<InMemoryBlobStore> {
        self.blobs.container(self.queue.name()).expect("container should exist")
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Fail the test if `future` does not finish within `timeout`
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future).await.expect("operation should finish in time")
}

pub fn payload(i: usize) -> Vec<u8> {
    format!("message-{i:04}").into_bytes()
}
