//! Remote collaborators and the bridge that batches calls against them

pub mod bridge;
pub mod ports;

pub use bridge::{ReceivedBatch, RemoteBridge};
pub use ports::{
    BatchFailure, BlobService, OverflowStore, QueueAttributes, QueueService, RemoteError,
    RemoteQueue, RemoteResult,
};
