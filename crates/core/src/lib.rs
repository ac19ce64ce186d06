//! # Spillway Core
//!
//! Batching, overflow and acknowledgment logic layered over a remote
//! at-least-once queue.
//!
//! This crate contains:
//! - The [`BufferedQueue`] facade and its lifecycle
//! - Local buffers, the refill policy and the wait/notify core
//! - The remote bridge (batching, retries, overflow pointers)
//! - Port traits for the queue service and the overflow store
//!
//! ## Architecture Principles
//! - Only depends on `spillway-common` and `spillway-domain`
//! - No SDK or network code; collaborators arrive through traits
//! - Every remote call runs outside the state lock except batched flushes

pub mod buffer;
pub mod collector;
pub mod errors;
pub mod queue;
pub mod remote;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use collector::{CollectorConfig, DeletionCollector};
pub use errors::{ErrorCell, QueueError, QueueResult};
pub use queue::{BufferedQueue, QueueMetrics, QueueMetricsSnapshot};
pub use remote::{
    BatchFailure, BlobService, OverflowStore, QueueAttributes, QueueService, RemoteBridge,
    RemoteError, RemoteQueue, RemoteResult,
};
pub use sync::{SyncCore, WaitOutcome};
