//! Cost guard: token and latency spending limits for the advisor panel
//!
//! Three independent triggers, evaluated once per decision against the
//! panel's aggregate usage: the per-decision token cap, the daily token cap
//! (reset at UTC midnight), and a wall-clock latency ceiling. A trip is a
//! policy signal for the coordinator, not an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CostGuardConfig;

/// Snapshot of the guard's counters, for telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CostGuardState {
    pub day: NaiveDate,
    pub daily_tokens: u64,
    pub failures: u32,
}

/// A tripped guard, carrying every triggered limit.
#[derive(Debug, Clone)]
pub struct CostGuardTrip {
    pub reasons: Vec<String>,
}

impl CostGuardTrip {
    pub fn summary(&self) -> String {
        format!("cost guard tripped: {}", self.reasons.join("; "))
    }
}

/// Stateful spending gate owned by one coordinator instance.
#[derive(Debug)]
pub struct CostGuard {
    config: CostGuardConfig,
    day: NaiveDate,
    daily_tokens: u64,
    failures: u32,
}

impl CostGuard {
    pub fn new(config: CostGuardConfig) -> Self {
        Self {
            config,
            day: chrono::Utc::now().date_naive(),
            daily_tokens: 0,
            failures: 0,
        }
    }

    /// Evaluate one decision's aggregate usage. Books the tokens against the
    /// daily total regardless of outcome — spent is spent.
    pub fn evaluate(&mut self, decision_tokens: u64, elapsed_ms: u64) -> Option<CostGuardTrip> {
        let today = chrono::Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.daily_tokens = 0;
        }
        self.daily_tokens += decision_tokens;

        let mut reasons = Vec::new();
        if decision_tokens > self.config.per_decision_token_cap {
            reasons.push(format!(
                "per-decision token cap exceeded ({decision_tokens} > {})",
                self.config.per_decision_token_cap
            ));
        }
        if self.daily_tokens > self.config.daily_token_cap {
            reasons.push(format!(
                "daily token cap exceeded ({} > {})",
                self.daily_tokens, self.config.daily_token_cap
            ));
        }
        if elapsed_ms > self.config.max_latency_ms {
            reasons.push(format!(
                "max latency exceeded ({elapsed_ms}ms > {}ms)",
                self.config.max_latency_ms
            ));
        }

        if reasons.is_empty() {
            return None;
        }
        self.failures += 1;
        warn!(
            decision_tokens,
            daily_tokens = self.daily_tokens,
            elapsed_ms,
            failures = self.failures,
            "Cost guard tripped"
        );
        Some(CostGuardTrip { reasons })
    }

    /// Decay the failure counter after a healthy decision.
    pub fn record_success(&mut self) {
        self.failures = self.failures.saturating_sub(1);
    }

    pub fn state(&self) -> CostGuardState {
        CostGuardState {
            day: self.day,
            daily_tokens: self.daily_tokens,
            failures: self.failures,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
