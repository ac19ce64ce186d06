//! In-process implementations of the remote collaborators
//!
//! Used by tests and local development; nothing here touches the network.

pub mod blob_store;
pub mod queue_service;

pub use blob_store::{InMemoryBlobService, InMemoryBlobStore};
pub use queue_service::{InMemoryQueue, InMemoryQueueService, QueueOperation, MAX_BODY_BYTES};
