//! Synchronization primitives for the local buffers

pub mod core;

pub use self::core::{SyncCore, WaitOutcome};
