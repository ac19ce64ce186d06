//! The application-facing queue and its supporting pieces

pub mod facade;
pub mod metrics;
pub mod provision;

pub use facade::BufferedQueue;
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use provision::{provision, Provisioned};
