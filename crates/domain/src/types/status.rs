use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle of a buffered queue.
///
/// `Active -> Draining -> Terminated` on shutdown, `Active -> Terminated`
/// on destroy. Only `Active` accepts operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Active,
    Draining,
    Terminated,
}

impl_domain_status_conversions!(QueueStatus {
    Active => "active",
    Draining => "draining",
    Terminated => "terminated",
});

impl QueueStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}
