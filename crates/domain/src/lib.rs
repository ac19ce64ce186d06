//! # Spillway Domain
//!
//! Pure data types for the buffered queue:
//! - queue options, validation and name resolution
//! - envelopes, acknowledgment tokens and the lifecycle status
//! - the wire codec shared by producers and consumers
//!
//! No I/O and no dependencies on other Spillway crates.

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
