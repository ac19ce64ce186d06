//! Pulling messages from the remote queue into egress
//!
//! A refill runs outside the state lock. Only one task refills at a time:
//! the [`RefillTicket`] is the single-flight guard. Releasing it signals
//! tasks waiting on the refill result, and wakes parked consumers only for
//! envelopes the refill left in egress. An empty refill wakes no one.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::debug;

use crate::buffer::LocalQueueState;
use crate::errors::QueueResult;
use crate::remote::{ReceivedBatch, RemoteBridge};
use crate::sync::SyncCore;

/// Receive up to `want` messages.
///
/// Skips the network entirely when the approximate remote count is zero.
/// Otherwise keeps receiving until `want` messages arrived or `empty_limit`
/// consecutive rounds produced nothing.
pub async fn refill_from_remote(
    bridge: &RemoteBridge,
    want: usize,
    empty_limit: u32,
) -> QueueResult<ReceivedBatch> {
    let mut batch = ReceivedBatch::default();
    if want == 0 {
        return Ok(batch);
    }

    let remote_len = bridge.approximate_length().await?;
    if remote_len == 0 {
        debug!("Remote queue reports no messages, skipping receive");
        return Ok(batch);
    }

    let mut empty_rounds = 0;
    while batch.envelopes.len() < want && empty_rounds < empty_limit {
        let round = bridge.receive(want - batch.envelopes.len()).await?;
        if round.is_empty() {
            empty_rounds += 1;
        } else {
            empty_rounds = 0;
            batch.merge(round);
        }
    }

    debug!(
        received = batch.envelopes.len(),
        tombstones = batch.tombstones.len(),
        want,
        "Refill finished"
    );
    Ok(batch)
}

/// Admits one refilling task at a time
pub struct RefillTicket<'a> {
    flag: &'a AtomicBool,
    core: &'a SyncCore<LocalQueueState>,
    finished: &'a Notify,
    leftover: usize,
}

impl<'a> RefillTicket<'a> {
    /// Take the ticket unless another task holds it. `finished` is signalled
    /// when the ticket is given back, whatever the outcome.
    pub fn acquire(
        flag: &'a AtomicBool,
        core: &'a SyncCore<LocalQueueState>,
        finished: &'a Notify,
    ) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, core, finished, leftover: 0 })
    }

    /// Give the ticket back, waking at most `leftover` parked consumers.
    /// Call while holding the state lock.
    pub fn release(mut self, leftover: usize) {
        self.leftover = leftover;
    }
}

impl Drop for RefillTicket<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.finished.notify_waiters();
        for _ in 0..self.leftover {
            if !self.core.wake_one() {
                break;
            }
        }
    }
}
