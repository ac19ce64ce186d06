//! Batching, overflow and retry policy between the local buffers and the
//! remote collaborators.
//!
//! Every remote call goes through a [`RetryExecutor`] driven by
//! [`ClassifiedRetry`]: transient failures are attempted again with
//! exponential backoff, permanent ones surface immediately, and a spent
//! budget escalates to [`QueueError::RetriesExhausted`]. Batch calls that
//! partially fail resend only the refused entries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use spillway_common::resilience::policies::ClassifiedRetry;
use spillway_common::resilience::{RetryConfig, RetryError, RetryExecutor};
use spillway_domain::constants::BATCH_LIMIT;
use spillway_domain::{
    decode_body, AckToken, Envelope, MessageContent, OverflowPointer, ReceiptHandle,
    ReceivedMessage, RetryBudget, WireMessage,
};
use tracing::{debug, instrument, warn};

use crate::errors::{QueueError, QueueResult};
use crate::queue::metrics::QueueMetrics;
use crate::remote::ports::{BatchFailure, OverflowStore, RemoteQueue};

/// Messages gathered by one or more receive calls
#[derive(Debug, Default)]
pub struct ReceivedBatch {
    /// Deliveries ready for `pop`
    pub envelopes: Vec<Envelope>,
    /// Deliveries that can never be surfaced; deleted like consumed ones
    pub tombstones: Vec<AckToken>,
}

impl ReceivedBatch {
    /// True when neither envelopes nor tombstones arrived
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty() && self.tombstones.is_empty()
    }

    /// Append another round's results
    pub fn merge(&mut self, other: ReceivedBatch) {
        self.envelopes.extend(other.envelopes);
        self.tombstones.extend(other.tombstones);
    }
}

/// Build the executor for one call class
pub fn retry_executor(
    attempts: u32,
    budget: &RetryBudget,
) -> QueueResult<RetryExecutor<ClassifiedRetry>> {
    let config = RetryConfig::builder()
        .max_attempts(attempts)
        .exponential_backoff(budget.base_delay, 2.0, budget.max_delay)
        .equal_jitter()
        .build()
        .map_err(|e| match e {
            RetryError::InvalidConfiguration { message } => QueueError::InvalidConfiguration(message),
            other => QueueError::InvalidConfiguration(format!("{other:?}")),
        })?;
    Ok(RetryExecutor::new(config, ClassifiedRetry))
}

/// Run `op` under `executor`, turning a spent budget into a queue error
pub async fn with_retry<T, F, Fut>(
    operation: &'static str,
    executor: &RetryExecutor<ClassifiedRetry>,
    op: F,
) -> QueueResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = QueueResult<T>>,
{
    let outcome = executor.execute_with_outcome(op).await;
    let attempts = outcome.attempts;
    outcome.result.map_err(|err| match err {
        RetryError::NonRetryable { source } => source,
        RetryError::AttemptsExhausted { attempts, last_error } => {
            QueueError::RetriesExhausted { operation, attempts, last_error: last_error.to_string() }
        }
        RetryError::TimeoutExceeded { last_error, .. } => QueueError::RetriesExhausted {
            operation,
            attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        },
        RetryError::InvalidConfiguration { message } => QueueError::InvalidConfiguration(message),
    })
}

struct CallRetries {
    send: RetryExecutor<ClassifiedRetry>,
    receive: RetryExecutor<ClassifiedRetry>,
    delete: RetryExecutor<ClassifiedRetry>,
    overflow: RetryExecutor<ClassifiedRetry>,
}

/// Remote queue and overflow store behind a per-call-class retry budget
pub struct RemoteBridge {
    queue: Arc<dyn RemoteQueue>,
    store: Arc<dyn OverflowStore>,
    overflow_threshold: usize,
    retries: CallRetries,
    metrics: Arc<QueueMetrics>,
    /// Messages sent by this bridge that still point at each overflow key.
    /// Held across the blob calls so an upload and a deletion of the same
    /// key never interleave.
    overflow_refs: tokio::sync::Mutex<HashMap<String, usize>>,
}

impl RemoteBridge {
    /// Build one retry executor per call class from `budget`
    pub fn new(
        queue: Arc<dyn RemoteQueue>,
        store: Arc<dyn OverflowStore>,
        overflow_threshold: usize,
        budget: &RetryBudget,
        metrics: Arc<QueueMetrics>,
    ) -> QueueResult<Self> {
        let retries = CallRetries {
            send: retry_executor(budget.send_attempts, budget)?,
            receive: retry_executor(budget.receive_attempts, budget)?,
            delete: retry_executor(budget.delete_attempts, budget)?,
            overflow: retry_executor(budget.overflow_attempts, budget)?,
        };
        Ok(Self {
            queue,
            store,
            overflow_threshold,
            retries,
            metrics,
            overflow_refs: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Ship every payload in `ingress`, ten at a time.
    ///
    /// A batch is removed from `ingress` only after the remote queue
    /// accepted all of it, so a failure leaves the unsent payloads in place.
    #[instrument(skip_all, fields(pending = ingress.len()))]
    pub async fn flush(&self, ingress: &mut VecDeque<Vec<u8>>) -> QueueResult<usize> {
        let mut sent = 0;
        while !ingress.is_empty() {
            let take = ingress.len().min(BATCH_LIMIT);
            let mut bodies = Vec::with_capacity(take);
            for payload in ingress.iter().take(take) {
                bodies.push(self.encode_outbound(payload).await?);
            }
            self.send_bodies(bodies).await?;
            ingress.drain(..take);
            sent += take;
        }
        self.metrics.record_flush(sent as u64);
        debug!(sent, "Flush complete");
        Ok(sent)
    }

    /// Receive up to `max` messages using `ceil(max / 10)` receive calls
    #[instrument(skip(self))]
    pub async fn receive(&self, max: usize) -> QueueResult<ReceivedBatch> {
        let mut batch = ReceivedBatch::default();
        let mut remaining = max;
        while remaining > 0 {
            let ask = remaining.min(BATCH_LIMIT);
            remaining -= ask;

            let queue = &self.queue;
            let metrics = &self.metrics;
            let messages = with_retry("receive", &self.retries.receive, move || async move {
                metrics.record_request();
                queue.receive_batch(ask).await.map_err(|e| QueueError::from_remote("receive", e))
            })
            .await?;

            for message in messages {
                self.resolve(message, &mut batch).await?;
            }
        }
        self.metrics.record_received(batch.envelopes.len() as u64);
        Ok(batch)
    }

    /// Approximate number of visible remote messages
    pub async fn approximate_length(&self) -> QueueResult<u64> {
        let queue = &self.queue;
        let metrics = &self.metrics;
        with_retry("approximate_count", &self.retries.receive, move || async move {
            metrics.record_request();
            queue.approximate_count().await.map_err(|e| QueueError::from_remote("approximate_count", e))
        })
        .await
    }

    /// Delete consumed messages ten at a time. A referenced blob is deleted
    /// once no message sent through this bridge points at it any more.
    #[instrument(skip_all, fields(batch_len = acks.len()))]
    pub async fn delete_batch(&self, acks: &[AckToken]) -> QueueResult<()> {
        for chunk in acks.chunks(BATCH_LIMIT) {
            let receipts: Vec<ReceiptHandle> = chunk.iter().map(|ack| ack.receipt.clone()).collect();
            let pending = Mutex::new(receipts);
            let pending = &pending;
            let queue = &self.queue;
            let metrics = &self.metrics;
            with_retry("delete", &self.retries.delete, move || async move {
                let receipts = pending.lock().clone();
                metrics.record_request();
                let failures = queue
                    .delete_batch(&receipts)
                    .await
                    .map_err(|e| QueueError::from_remote("delete", e))?;
                retain_failed(pending, &receipts, &failures, "delete")
            })
            .await?;

            let mut refs = self.overflow_refs.lock().await;
            let mut seen = HashSet::new();
            for key in chunk.iter().filter_map(|ack| ack.overflow_key.as_deref()) {
                if !release_ref(&mut refs, key) || !seen.insert(key) {
                    continue;
                }
                let store = &self.store;
                with_retry("overflow_delete", &self.retries.overflow, move || async move {
                    metrics.record_request();
                    store.delete(key).await.map_err(|e| QueueError::from_remote("overflow_delete", e))
                })
                .await?;
            }

            drop(refs);

            self.metrics.record_acks_deleted(chunk.len() as u64);
        }
        Ok(())
    }

    /// Remove the remote queue and its overflow container
    pub async fn delete_resources(&self) -> QueueResult<()> {
        let queue = &self.queue;
        let store = &self.store;
        let metrics = &self.metrics;
        with_retry("delete_queue", &self.retries.delete, move || async move {
            metrics.record_request();
            queue.delete_queue().await.map_err(|e| QueueError::from_remote("delete_queue", e))
        })
        .await?;
        with_retry("delete_container", &self.retries.overflow, move || async move {
            metrics.record_request();
            store.delete_container().await.map_err(|e| QueueError::from_remote("delete_container", e))
        })
        .await
    }

    /// Wire body for `payload`, uploading it to the overflow store when the
    /// raw body would exceed the threshold.
    async fn encode_outbound(&self, payload: &[u8]) -> QueueResult<String> {
        let body = WireMessage::raw(payload).to_body()?;
        if body.len() <= self.overflow_threshold {
            return Ok(body);
        }

        let pointer = OverflowPointer::for_payload(payload);
        let key = pointer.key();
        let store = &self.store;
        let metrics = &self.metrics;

        let mut refs = self.overflow_refs.lock().await;
        let exists = with_retry("overflow_exists", &self.retries.overflow, move || async move {
            metrics.record_request();
            store.exists(key).await.map_err(|e| QueueError::from_remote("overflow_exists", e))
        })
        .await?;

        if exists {
            debug!(key, "Overflow blob already stored, skipping upload");
            metrics.record_dedup_hit();
        } else {
            with_retry("overflow_put", &self.retries.overflow, move || async move {
                metrics.record_request();
                store.put(key, payload).await.map_err(|e| QueueError::from_remote("overflow_put", e))
            })
            .await?;
            metrics.record_overflow_upload();
            debug!(key, size = payload.len(), "Uploaded overflow payload");
        }
        *refs.entry(key.to_string()).or_default() += 1;

        Ok(WireMessage::overflow(&pointer).to_body()?)
    }

    async fn send_bodies(&self, bodies: Vec<String>) -> QueueResult<()> {
        let pending = Mutex::new(bodies);
        let pending = &pending;
        let queue = &self.queue;
        let metrics = &self.metrics;
        with_retry("send", &self.retries.send, move || async move {
            let bodies = pending.lock().clone();
            metrics.record_request();
            let failures =
                queue.send_batch(&bodies).await.map_err(|e| QueueError::from_remote("send", e))?;
            retain_failed(pending, &bodies, &failures, "send")
        })
        .await
    }

    async fn resolve(&self, message: ReceivedMessage, batch: &mut ReceivedBatch) -> QueueResult<()> {
        let ReceivedMessage { receipt, body } = message;
        match decode_body(&body) {
            Ok(MessageContent::Payload(payload)) => {
                batch.envelopes.push(Envelope::remote(payload, receipt, None));
            }
            Ok(MessageContent::Pointer(pointer)) => {
                let store = &self.store;
                let metrics = &self.metrics;
                let key = pointer.key();
                let blob = with_retry("overflow_get", &self.retries.overflow, move || async move {
                    metrics.record_request();
                    store.get(key).await.map_err(|e| QueueError::from_remote("overflow_get", e))
                })
                .await?;

                match blob {
                    Some(payload) => batch
                        .envelopes
                        .push(Envelope::remote(payload, receipt, Some(pointer.into_key()))),
                    None => {
                        let missing = QueueError::OverflowMissing { key: key.to_string() };
                        warn!(receipt = %receipt, error = %missing, "Dropping message as tombstone");
                        self.metrics.record_tombstone();
                        batch.tombstones.push(AckToken { receipt, overflow_key: None });
                    }
                }
            }
            Err(err) => {
                warn!(receipt = %receipt, error = %err, "Undecodable message body, dropping as tombstone");
                self.metrics.record_tombstone();
                batch.tombstones.push(AckToken { receipt, overflow_key: None });
            }
        }
        Ok(())
    }
}

/// Drop one reference to `key`; true when no known message still needs the
/// blob. Keys this bridge never sent are treated as unreferenced.
fn release_ref(refs: &mut HashMap<String, usize>, key: &str) -> bool {
    match refs.get_mut(key) {
        Some(count) if *count > 1 => {
            *count -= 1;
            false
        }
        Some(_) => {
            refs.remove(key);
            true
        }
        None => true,
    }
}

/// Keep only the refused entries for the next attempt
fn retain_failed<T: Clone>(
    pending: &Mutex<Vec<T>>,
    submitted: &[T],
    failures: &[BatchFailure],
    operation: &'static str,
) -> QueueResult<()> {
    if failures.is_empty() {
        pending.lock().clear();
        return Ok(());
    }

    let retry: Vec<T> = failures.iter().filter_map(|f| submitted.get(f.index).cloned()).collect();
    let message = format!(
        "{} of {} entries refused: {}",
        failures.len(),
        submitted.len(),
        failures.first().map(|f| f.message.as_str()).unwrap_or_default()
    );
    *pending.lock() = retry;
    Err(QueueError::RemoteTransient { operation, message, retry_after: None })
}
