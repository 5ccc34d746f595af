//! Time budgeting for the decision pipeline
//!
//! - `tracker`: per-stage allocations, reservations, cascading overrun,
//!   preemption queries
//! - `metrics`: bounded rolling latency windows with percentile snapshots

pub mod metrics;
pub mod tracker;

pub use metrics::{LatencySnapshot, RollingWindow};
pub use tracker::{Stage, TimeBudgetTracker};
