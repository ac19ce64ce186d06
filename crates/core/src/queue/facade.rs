//! The buffered queue handed to application code.
//!
//! Producers append to a local ingress buffer; once it reaches
//! `buffer_size` the pushing task flushes it to the remote queue in batches
//! before returning. Consumers read from a local egress buffer that is
//! refilled from the remote queue, or straight from ingress when the remote
//! queue has nothing. Deleting consumed messages happens in the background.
//!
//! # Example
//!
//! ```no_run
//! use spillway_core::queue::BufferedQueue;
//! use spillway_core::remote::{BlobService, QueueService};
//! use spillway_domain::QueueOptions;
//!
//! # async fn example(
//! #     queues: &dyn QueueService,
//! #     blobs: &dyn BlobService,
//! # ) -> Result<(), spillway_core::errors::QueueError> {
//! let options = QueueOptions::new(50).with_namespace("jobs").with_name("thumbnails");
//! let queue = BufferedQueue::connect(&options, queues, blobs).await?;
//!
//! queue.push(b"resize:42".to_vec()).await?;
//! let job = queue.pop().await?;
//!
//! queue.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::RwLock;
use spillway_domain::{QueueOptions, QueueSettings, QueueStatus};
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::buffer::{refill_from_remote, LocalQueueState, RefillTicket};
use crate::collector::{CollectorConfig, DeletionCollector};
use crate::errors::{ErrorCell, QueueError, QueueResult};
use crate::queue::metrics::{QueueMetrics, QueueMetricsSnapshot};
use crate::queue::provision::{provision, Provisioned};
use crate::remote::{BlobService, QueueService, RemoteBridge};
use crate::sync::SyncCore;

#[derive(Debug, Clone, Copy)]
enum PopMode {
    NonBlocking,
    Blocking,
    Until(Instant),
}

/// Client-side batching queue over a remote at-least-once queue.
///
/// Shared between tasks behind an `Arc`; every operation takes `&self`.
pub struct BufferedQueue {
    name: String,
    url: String,
    settings: QueueSettings,
    core: Arc<SyncCore<LocalQueueState>>,
    bridge: Arc<RemoteBridge>,
    errors: Arc<ErrorCell>,
    metrics: Arc<QueueMetrics>,
    status: RwLock<QueueStatus>,
    refilling: AtomicBool,
    refill_done: Notify,
    collector: Mutex<DeletionCollector>,
    collector_wake: Arc<Notify>,
}

impl BufferedQueue {
    /// Validate `options`, provision the remote queue and its overflow
    /// container, and start the deletion collector.
    ///
    /// Invalid options fail before any remote call is made.
    #[instrument(skip_all, fields(buffer_size = ?options.buffer_size))]
    pub async fn connect(
        options: &QueueOptions,
        queues: &dyn QueueService,
        blobs: &dyn BlobService,
    ) -> QueueResult<Self> {
        let settings = options.validate()?;
        let metrics = Arc::new(QueueMetrics::new());

        let Provisioned { queue, url, store } =
            provision(queues, blobs, &settings, &metrics).await?;

        let bridge = Arc::new(RemoteBridge::new(
            queue,
            store,
            settings.overflow_threshold_bytes,
            &settings.retry,
            Arc::clone(&metrics),
        )?);
        let core = Arc::new(SyncCore::new(LocalQueueState::new(settings.buffer_size)));
        let errors = Arc::new(ErrorCell::new());

        let mut collector = DeletionCollector::new(
            Arc::clone(&core),
            Arc::clone(&bridge),
            Arc::clone(&errors),
            CollectorConfig {
                interval: settings.collector_interval,
                join_timeout: settings.collector_join_timeout,
            },
        );
        collector.start()?;
        let collector_wake = collector.waker();

        info!(queue = %settings.name, url = %url, "Buffered queue connected");
        Ok(Self {
            name: settings.name.clone(),
            url,
            settings,
            core,
            bridge,
            errors,
            metrics,
            status: RwLock::new(QueueStatus::Active),
            refilling: AtomicBool::new(false),
            refill_done: Notify::new(),
            collector: Mutex::new(collector),
            collector_wake,
        })
    }

    /// Append a payload. Flushes ingress to the remote queue when it
    /// reaches `buffer_size`, so this call may wait on the network.
    #[instrument(skip(self, payload), fields(queue = %self.name))]
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> QueueResult<()> {
        let mut state = self.core.lock().await;
        self.ensure_available()?;

        if state.enqueue(payload.into()) {
            if let Err(e) = self.bridge.flush(state.ingress_mut()).await {
                return Err(self.fatal(e));
            }
        }
        self.metrics.record_push();
        drop(state);

        self.core.wake_one();
        self.collector_wake.notify_one();
        Ok(())
    }

    /// Remove the next payload, waiting until one is available
    pub async fn pop(&self) -> QueueResult<Vec<u8>> {
        match self.pop_inner(PopMode::Blocking).await? {
            Some(payload) => Ok(payload),
            None => Err(QueueError::QueueEmpty),
        }
    }

    /// Remove the next payload or fail with [`QueueError::QueueEmpty`]
    pub async fn try_pop(&self) -> QueueResult<Vec<u8>> {
        match self.pop_inner(PopMode::NonBlocking).await? {
            Some(payload) => Ok(payload),
            None => Err(QueueError::QueueEmpty),
        }
    }

    /// Remove the next payload, giving up with `None` after `timeout`
    pub async fn pop_timeout(&self, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        self.pop_inner(PopMode::Until(Instant::now() + timeout)).await
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    async fn pop_inner(&self, mode: PopMode) -> QueueResult<Option<Vec<u8>>> {
        loop {
            let mut state = self.core.lock().await;
            self.ensure_available()?;

            if let Some(payload) = state.take_next() {
                return Ok(Some(self.delivered(state, payload)));
            }

            match RefillTicket::acquire(&self.refilling, &self.core, &self.refill_done) {
                Some(ticket) => {
                    let want = state.shortfall();
                    drop(state);

                    let fetched =
                        refill_from_remote(&self.bridge, want, self.settings.empty_receive_limit)
                            .await;

                    state = self.core.lock().await;
                    let batch = match fetched {
                        Ok(batch) => batch,
                        Err(e) => return Err(self.fatal(e)),
                    };
                    // Stopped while refilling: the batch is left for redelivery.
                    self.ensure_available()?;
                    state.absorb(batch);
                    if state.egress_len() == 0 {
                        let promoted = state.promote_ingress();
                        if promoted > 0 {
                            debug!(promoted, "Served from local ingress");
                            self.metrics.record_local_promotion(promoted as u64);
                        }
                    }

                    let next = state.take_next();
                    ticket.release(state.egress_len());
                    if let Some(payload) = next {
                        return Ok(Some(self.delivered(state, payload)));
                    }
                    if state.pending_acks() > 0 {
                        self.collector_wake.notify_one();
                    }
                    if matches!(mode, PopMode::NonBlocking) {
                        return Err(QueueError::QueueEmpty);
                    }
                }
                None if matches!(mode, PopMode::NonBlocking) => {
                    // Another task is refilling; wait for its result.
                    let mut finished = std::pin::pin!(self.refill_done.notified());
                    finished.as_mut().enable();
                    drop(state);
                    finished.await;
                    continue;
                }
                None => {}
            }

            let now = Instant::now();
            let idle = now + self.settings.idle_poll_interval;
            let deadline = match mode {
                PopMode::Until(deadline) if deadline <= now => return Ok(None),
                PopMode::Until(deadline) => deadline.min(idle),
                PopMode::NonBlocking | PopMode::Blocking => idle,
            };
            drop(self.core.wait(state, Some(deadline)).await);
        }
    }

    fn delivered(&self, state: MutexGuard<'_, LocalQueueState>, payload: Vec<u8>) -> Vec<u8> {
        self.metrics.record_pop();
        let owes_acks = state.pending_acks() > 0;
        drop(state);
        if owes_acks {
            self.collector_wake.notify_one();
        }
        payload
    }

    /// Approximate remote count plus everything buffered locally
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn len(&self) -> QueueResult<usize> {
        let state = self.core.lock().await;
        self.ensure_available()?;
        let remote = match self.bridge.approximate_length().await {
            Ok(remote) => remote,
            Err(e) => return Err(self.fatal(e)),
        };
        let remote = usize::try_from(remote).unwrap_or(usize::MAX);
        Ok(remote.saturating_add(state.local_len()))
    }

    /// True when [`BufferedQueue::len`] reports zero
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Pop without blocking until the queue reports empty; returns how many
    /// payloads were discarded.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn clear(&self) -> QueueResult<usize> {
        let mut cleared = 0;
        loop {
            match self.try_pop().await {
                Ok(_) => cleared += 1,
                Err(QueueError::QueueEmpty) => {
                    if self.is_empty().await? {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
        info!(cleared, "Queue cleared");
        Ok(cleared)
    }

    /// Number of consumers currently parked in `pop`
    pub fn num_waiting(&self) -> QueueResult<usize> {
        self.ensure_available()?;
        Ok(self.core.num_waiting())
    }

    /// Flush everything held locally, delete outstanding acknowledgments and
    /// terminate. The remote queue and its contents are kept.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn shutdown(&self) -> QueueResult<()> {
        {
            let mut status = self.status.write();
            if !status.is_active() {
                return Err(QueueError::unavailable(format!("queue is {}", *status)));
            }
            *status = QueueStatus::Draining;
        }
        info!("Shutting down buffered queue");
        self.core.wake_all();

        let flushed = {
            let mut state = self.core.lock().await;
            let mut unsent = state.take_unsent();
            let result = self.bridge.flush(&mut unsent).await;
            if !unsent.is_empty() {
                warn!(unsent = unsent.len(), "Payloads could not be flushed during shutdown");
                state.ingress_mut().extend(unsent);
            }
            result
        };

        let drained = self.collector.lock().await.shutdown().await;

        *self.status.write() = QueueStatus::Terminated;
        self.core.wake_all();

        if let Err(e) = flushed {
            return Err(self.fatal(e));
        }
        drained?;
        // A collector failure means acknowledgments were abandoned.
        self.errors.check()?;
        info!("Buffered queue shut down");
        Ok(())
    }

    /// Stop immediately and delete the remote queue and its overflow
    /// container. Unacknowledged deletions are abandoned.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn destroy(&self) -> QueueResult<()> {
        {
            let mut status = self.status.write();
            if status.is_terminated() {
                return Err(QueueError::unavailable("queue is terminated"));
            }
            *status = QueueStatus::Terminated;
        }
        info!("Destroying buffered queue");
        self.core.wake_all();

        self.collector.lock().await.abort().await;
        self.bridge.delete_resources().await
    }

    /// Full remote queue name, namespace included
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL the queue service reported at provisioning
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state
    pub fn status(&self) -> QueueStatus {
        *self.status.read()
    }

    /// Validated settings this queue was built with
    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Snapshot of the queue counters
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Total calls made against the queue service and the blob store
    pub fn request_count(&self) -> u64 {
        self.metrics.request_count()
    }

    /// Recorded failures first, then the lifecycle state
    fn ensure_available(&self) -> QueueResult<()> {
        self.errors.check()?;
        let status = self.status();
        if status.is_active() {
            Ok(())
        } else {
            Err(QueueError::unavailable(format!("queue is {status}")))
        }
    }

    fn fatal(&self, err: QueueError) -> QueueError {
        if self.errors.record(err.clone()) {
            self.core.wake_all();
        }
        err
    }
}
