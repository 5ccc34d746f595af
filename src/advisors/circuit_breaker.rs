//! Circuit breaker: consecutive-failure cooldown for the advisor panel
//!
//! Counts consecutive failed decisions (zero usable outputs with failures
//! present, or a cost-guard trip). At the threshold the breaker opens for a
//! cooldown measured in decisions; while open, the coordinator short-circuits
//! without querying anyone. Stepped exactly once per decision.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;

/// Snapshot of the breaker's counters, for telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub consecutive_failures: u32,
    pub cooldown_remaining: u32,
}

/// Stateful failure-streak gate owned by one coordinator instance.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
    cooldown_remaining: u32,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            cooldown_remaining: 0,
        }
    }

    /// Advance the cooldown by one decision. Call exactly once at the start
    /// of every query.
    pub fn step(&mut self) {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
        }
    }

    /// Whether the panel is still cooling down.
    pub fn is_open(&self) -> bool {
        self.cooldown_remaining > 0
    }

    /// Record a failed decision. Returns true when this failure opened the
    /// breaker.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.failure_threshold {
            self.open("failure threshold reached");
            return true;
        }
        false
    }

    /// Open immediately, bypassing the failure streak. Used by cost-guard
    /// trips, which are severe enough to halt the panel on their own.
    pub fn force_open(&mut self) {
        self.open("forced open");
    }

    fn open(&mut self, cause: &str) {
        warn!(
            consecutive_failures = self.consecutive_failures,
            cooldown_decisions = self.config.cooldown_decisions,
            cause,
            "Circuit breaker opened"
        );
        self.cooldown_remaining = self.config.cooldown_decisions;
        self.consecutive_failures = 0;
    }

    /// Record a healthy decision: the streak resets and any cooldown ends.
    pub fn record_success(&mut self) {
        if self.cooldown_remaining > 0 {
            info!("Circuit breaker reset after successful decision");
        }
        self.consecutive_failures = 0;
        self.cooldown_remaining = 0;
    }

    pub fn state(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            consecutive_failures: self.consecutive_failures,
            cooldown_remaining: self.cooldown_remaining,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
