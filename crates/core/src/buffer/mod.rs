//! Local ingress/egress buffers and the refill policy

pub mod refill;
pub mod state;

pub use refill::{refill_from_remote, RefillTicket};
pub use state::LocalQueueState;
