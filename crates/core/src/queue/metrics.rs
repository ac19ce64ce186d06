use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Counters for one buffered queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    remote_requests: AtomicU64,
    pushes: AtomicU64,
    pops: AtomicU64,
    flushes: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    overflow_uploads: AtomicU64,
    dedup_hits: AtomicU64,
    tombstones: AtomicU64,
    acks_deleted: AtomicU64,
    local_promotions: AtomicU64,
}

impl QueueMetrics {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made against the queue service or the blob store
    pub fn record_request(&self) {
        self.remote_requests.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_push(&self) {
        self.pushes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_pop(&self) {
        self.pops.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_flush(&self, sent: u64) {
        self.flushes.fetch_add(1, AtomicOrdering::Relaxed);
        self.messages_sent.fetch_add(sent, AtomicOrdering::Relaxed);
    }

    pub fn record_received(&self, count: u64) {
        self.messages_received.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub fn record_overflow_upload(&self) {
        self.overflow_uploads.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_dedup_hit(&self) {
        self.dedup_hits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_tombstone(&self) {
        self.tombstones.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_acks_deleted(&self, count: u64) {
        self.acks_deleted.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub fn record_local_promotion(&self, count: u64) {
        self.local_promotions.fetch_add(count, AtomicOrdering::Relaxed);
    }

    /// Current value of the remote request counter
    pub fn request_count(&self) -> u64 {
        self.remote_requests.load(AtomicOrdering::Relaxed)
    }

    /// Copy every counter
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            remote_requests: self.remote_requests.load(AtomicOrdering::Relaxed),
            pushes: self.pushes.load(AtomicOrdering::Relaxed),
            pops: self.pops.load(AtomicOrdering::Relaxed),
            flushes: self.flushes.load(AtomicOrdering::Relaxed),
            messages_sent: self.messages_sent.load(AtomicOrdering::Relaxed),
            messages_received: self.messages_received.load(AtomicOrdering::Relaxed),
            overflow_uploads: self.overflow_uploads.load(AtomicOrdering::Relaxed),
            dedup_hits: self.dedup_hits.load(AtomicOrdering::Relaxed),
            tombstones: self.tombstones.load(AtomicOrdering::Relaxed),
            acks_deleted: self.acks_deleted.load(AtomicOrdering::Relaxed),
            local_promotions: self.local_promotions.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    /// Calls against the queue service or the blob store, retries included
    pub remote_requests: u64,
    /// Successful `push` calls
    pub pushes: u64,
    /// Payloads handed out by any pop variant
    pub pops: u64,
    /// Completed flushes of ingress
    pub flushes: u64,
    /// Messages accepted by the remote queue
    pub messages_sent: u64,
    /// Messages received and decoded, tombstones excluded
    pub messages_received: u64,
    /// Blobs uploaded to the overflow store
    pub overflow_uploads: u64,
    /// Oversized payloads whose blob already existed
    pub dedup_hits: u64,
    /// Deliveries dropped because they could not be decoded or resolved
    pub tombstones: u64,
    /// Remote messages deleted after consumption
    pub acks_deleted: u64,
    /// Payloads served from ingress without a remote round trip
    pub local_promotions: u64,
}
