//! Domain constants
//!
//! Limits imposed by the remote queue service and the defaults applied to
//! [`crate::QueueOptions`].

// Remote service limits
pub const BATCH_LIMIT: usize = 10;
pub const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;
pub const MAX_QUEUE_NAME_LENGTH: usize = 80;

// Buffering
pub const MIN_BUFFER_SIZE: usize = 5;
pub const DEFAULT_OVERFLOW_THRESHOLD_BYTES: usize = 64_000;
pub const DEFAULT_EMPTY_RECEIVE_LIMIT: u32 = 5;

// Retry budget per call class
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const MAX_RETRY_ATTEMPTS: u32 = 100;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

// Timing
pub const DEFAULT_IDLE_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_COLLECTOR_INTERVAL_MS: u64 = 250;
pub const DEFAULT_COLLECTOR_JOIN_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RECREATE_DELAY_MS: u64 = 62_000; // service refuses a same-name create for 60s

// Naming
pub const QUEUE_NAME_PREFIX: &str = "queue";
pub const TEMP_NAME_PREFIX: &str = "temp-name";
