//! Background deletion of consumed messages.
//!
//! `pop` only appends acknowledgment tokens to the shared state; this worker
//! takes them out under the lock and deletes them outside it, ten at a time,
//! so consumers never wait on a delete round trip.
//!
//! Each tick runs on a fixed interval or as soon as [`DeletionCollector::nudge`]
//! is called. Two cancellation tokens select how the worker stops:
//! `drain` performs a last collection before exiting, `abort` exits at the
//! next await point and abandons whatever is left. A delete failure that
//! survives the retry budget is recorded in the [`ErrorCell`] and the worker
//! idles until it is stopped.

use std::sync::Arc;
use std::time::Duration;

use spillway_common::error::CommonError;
use spillway_domain::constants::BATCH_LIMIT;
use spillway_domain::AckToken;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::buffer::LocalQueueState;
use crate::errors::{ErrorCell, QueueError, QueueResult};
use crate::remote::RemoteBridge;
use crate::sync::SyncCore;

/// Timing for the deletion worker
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Interval between ticks when nobody nudges the worker
    pub interval: Duration,
    /// How long `shutdown` waits for the final drain
    pub join_timeout: Duration,
}

/// Deletion worker with explicit lifecycle management
pub struct DeletionCollector {
    core: Arc<SyncCore<LocalQueueState>>,
    bridge: Arc<RemoteBridge>,
    errors: Arc<ErrorCell>,
    config: CollectorConfig,
    wake: Arc<Notify>,
    drain: CancellationToken,
    abort: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl DeletionCollector {
    /// Build a stopped collector; [`DeletionCollector::start`] spawns it
    pub fn new(
        core: Arc<SyncCore<LocalQueueState>>,
        bridge: Arc<RemoteBridge>,
        errors: Arc<ErrorCell>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            core,
            bridge,
            errors,
            config,
            wake: Arc::new(Notify::new()),
            drain: CancellationToken::new(),
            abort: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawn the background task
    #[instrument(skip(self))]
    pub fn start(&mut self) -> QueueResult<()> {
        if self.is_running() {
            return Err(QueueError::Common(CommonError::internal_with_context(
                "collector already running",
                "deletion_collector",
            )));
        }

        self.drain = CancellationToken::new();
        self.abort = CancellationToken::new();

        let core = Arc::clone(&self.core);
        let bridge = Arc::clone(&self.bridge);
        let errors = Arc::clone(&self.errors);
        let wake = Arc::clone(&self.wake);
        let interval = self.config.interval;
        let drain = self.drain.clone();
        let abort = self.abort.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(core, bridge, errors, wake, interval, drain, abort).await;
        });

        self.task_handle = Some(handle);
        debug!("Deletion collector started");
        Ok(())
    }

    /// Handle that triggers an immediate tick
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Trigger an immediate tick
    pub fn nudge(&self) {
        self.wake.notify_one();
    }

    /// True between `start` and `shutdown` or `abort`
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Delete every outstanding acknowledgment, then stop
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> QueueResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };

        info!("Draining deletion collector");
        self.drain.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Deletion collector task panicked");
                Err(QueueError::Common(CommonError::task_cancelled_with_reason(
                    "deletion_collector",
                    e.to_string(),
                )))
            }
            Err(_) => {
                warn!(timeout = ?self.config.join_timeout, "Deletion collector did not drain in time");
                self.abort.cancel();
                Err(QueueError::Common(CommonError::timeout(
                    "deletion_collector.shutdown",
                    self.config.join_timeout,
                )))
            }
        }
    }

    /// Stop at the next await point, abandoning undeleted acknowledgments
    #[instrument(skip(self))]
    pub async fn abort(&mut self) {
        self.abort.cancel();
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Deletion collector task panicked");
            }
        }
    }

    async fn process_loop(
        core: Arc<SyncCore<LocalQueueState>>,
        bridge: Arc<RemoteBridge>,
        errors: Arc<ErrorCell>,
        wake: Arc<Notify>,
        interval: Duration,
        drain: CancellationToken,
        abort: CancellationToken,
    ) {
        let mut ready: Vec<AckToken> = Vec::new();
        let mut failed = false;

        loop {
            if failed {
                tokio::select! {
                    _ = abort.cancelled() => break,
                    _ = drain.cancelled() => break,
                }
            }

            let draining = tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    debug!("Deletion collector aborted");
                    break;
                }
                _ = drain.cancelled() => true,
                _ = wake.notified() => false,
                _ = tokio::time::sleep(interval) => false,
            };

            let result = tokio::select! {
                _ = abort.cancelled() => break,
                result = Self::collect(&core, &bridge, &mut ready) => result,
            };

            if let Err(e) = result {
                errors.record(e);
                failed = true;
                continue;
            }

            if draining {
                debug!("Deletion collector drained");
                break;
            }
        }

        if !ready.is_empty() {
            warn!(abandoned = ready.len(), "Deletion collector stopped with undeleted acknowledgments");
        }
    }

    /// Move pending acknowledgments out of the shared state and delete them
    async fn collect(
        core: &SyncCore<LocalQueueState>,
        bridge: &RemoteBridge,
        ready: &mut Vec<AckToken>,
    ) -> QueueResult<()> {
        ready.extend(core.with_lock(LocalQueueState::take_acks).await);

        while !ready.is_empty() {
            let take = ready.len().min(BATCH_LIMIT);
            bridge.delete_batch(&ready[..take]).await?;
            ready.drain(..take);
        }
        Ok(())
    }
}

impl Drop for DeletionCollector {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("DeletionCollector dropped while running; cancelling task");
            self.abort.cancel();
        }
    }
}
