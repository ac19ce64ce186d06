//! # Spillway Infrastructure
//!
//! Implementations and wiring around the core crate.
//!
//! This crate contains:
//! - In-memory queue service and overflow store implementing the core ports
//! - Queue options loading from environment variables and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `spillway-core`
//! - Depends on `spillway-domain` for options and on `spillway-common` for
//!   shared errors

pub mod config;
pub mod memory;
pub mod observability;

pub use memory::{InMemoryBlobService, InMemoryBlobStore, InMemoryQueue, InMemoryQueueService};
pub use observability::{init_tracing, LogFormat};
