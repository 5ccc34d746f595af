//! Rolling latency window for per-stage budget metrics
//!
//! Bounded sample window with nearest-rank percentiles. Feeds the
//! `metrics_snapshot` query on the budget tracker.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Percentile summary over the current window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatencySnapshot {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub samples: usize,
}

/// Fixed-capacity rolling window of recorded stage durations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Record one duration, evicting the oldest sample when full.
    pub fn push(&mut self, ms: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Nearest-rank percentile; zero on an empty window.
    fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (p * sorted.len() as f64).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            p50_ms: self.percentile(0.50),
            p95_ms: self.percentile(0.95),
            p99_ms: self.percentile(0.99),
            samples: self.samples.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
