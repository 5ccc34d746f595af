//! Time budget tracker: per-stage allocations with cascading overrun
//!
//! Single source of truth for "how much time is left" per decision, at both
//! the global and per-stage level, and the only place that decides whether a
//! stage must be skipped.
//!
//! ## Cascading overrun
//!
//! When a stage reports usage beyond its remaining allocation, the deficit
//! is first absorbed from the shared buffer ceiling; any remainder is pulled
//! from downstream stages in pipeline order, never below zero. The buffer is
//! only ever a first absorber, never a downstream donor target. When a stage
//! finalizes under its allocation, the surplus flows back to the buffer, but
//! only up to the buffer's original size — partial intermediate reports
//! (`finalize = false`) never grow the buffer.
//!
//! ## Ownership
//!
//! Single-writer by design: one tracker is owned by exactly one in-flight
//! decision and is not internally synchronized. Hosts running rounds in
//! parallel must use separate instances.

use std::time::Instant;
use tracing::{debug, warn};

use super::metrics::{LatencySnapshot, RollingWindow};
use crate::config::BudgetConfig;

// ============================================================================
// Stages
// ============================================================================

/// Pipeline stages in execution order, plus the shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Perception,
    Solver,
    Advisors,
    Synthesis,
    Execution,
    Buffer,
}

impl Stage {
    /// Real pipeline stages in order; the buffer is not a stage of work.
    pub const PIPELINE: [Stage; 5] = [
        Stage::Perception,
        Stage::Solver,
        Stage::Advisors,
        Stage::Synthesis,
        Stage::Execution,
    ];

    fn index(self) -> usize {
        match self {
            Stage::Perception => 0,
            Stage::Solver => 1,
            Stage::Advisors => 2,
            Stage::Synthesis => 3,
            Stage::Execution => 4,
            Stage::Buffer => 5,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Perception => write!(f, "perception"),
            Stage::Solver => write!(f, "solver"),
            Stage::Advisors => write!(f, "advisors"),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Execution => write!(f, "execution"),
            Stage::Buffer => write!(f, "buffer"),
        }
    }
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Debug, Clone, Default)]
struct StageState {
    allocated_ms: u64,
    original_ms: u64,
    used_ms: u64,
    pending_ms: u64,
    started: Option<Instant>,
}

impl StageState {
    fn remaining(&self) -> u64 {
        self.allocated_ms
            .saturating_sub(self.used_ms + self.pending_ms)
    }
}

/// Wall-clock budget tracker for one in-flight decision.
pub struct TimeBudgetTracker {
    total_ms: u64,
    started_at: Option<Instant>,
    stages: [StageState; 6],
    windows: [RollingWindow; 6],
}

impl TimeBudgetTracker {
    /// Build a tracker from the configured per-stage ceilings.
    pub fn new(config: &BudgetConfig) -> Self {
        Self::with_allocations(
            config.total_ms,
            [
                config.perception_ms,
                config.solver_ms,
                config.advisors_ms,
                config.synthesis_ms,
                config.execution_ms,
                config.buffer_ms,
            ],
            config.metrics_window,
        )
    }

    /// Build a tracker with explicit allocations (perception, solver,
    /// advisors, synthesis, execution, buffer).
    pub fn with_allocations(total_ms: u64, allocations: [u64; 6], window: usize) -> Self {
        let stages = allocations.map(|ms| StageState {
            allocated_ms: ms,
            original_ms: ms,
            used_ms: 0,
            pending_ms: 0,
            started: None,
        });
        Self {
            total_ms,
            started_at: None,
            stages,
            windows: std::array::from_fn(|_| RollingWindow::new(window)),
        }
    }

    /// Begin the global decision clock.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Begin a stage timer; `end_component` records the elapsed time.
    pub fn start_component(&mut self, stage: Stage) {
        self.stages[stage.index()].started = Some(Instant::now());
    }

    /// Stop a stage timer and record its elapsed time as finalized usage.
    ///
    /// Returns the elapsed milliseconds, or 0 if the timer was never started.
    pub fn end_component(&mut self, stage: Stage) -> u64 {
        let Some(started) = self.stages[stage.index()].started.take() else {
            warn!(stage = %stage, "end_component without start_component");
            return 0;
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.record_actual(stage, elapsed_ms, true);
        elapsed_ms
    }

    /// Optimistically reserve `ms` against a stage's remaining allocation.
    ///
    /// Returns false (and books nothing) when the stage cannot cover it.
    pub fn reserve(&mut self, stage: Stage, ms: u64) -> bool {
        let state = &mut self.stages[stage.index()];
        if ms > state.remaining() {
            debug!(
                stage = %stage,
                requested_ms = ms,
                remaining_ms = state.remaining(),
                "Budget reservation denied"
            );
            return false;
        }
        state.pending_ms += ms;
        true
    }

    /// Release an unused reservation (or part of one).
    pub fn release(&mut self, stage: Stage, ms: u64) {
        let state = &mut self.stages[stage.index()];
        state.pending_ms = state.pending_ms.saturating_sub(ms);
    }

    /// Record actual usage for a stage, consuming any pending reservation
    /// first. `finalize` marks the stage as finished, which is the only
    /// point where an under-budget surplus is returned to the buffer.
    pub fn record_actual(&mut self, stage: Stage, ms: u64, finalize: bool) {
        let idx = stage.index();
        {
            let state = &mut self.stages[idx];
            state.pending_ms = state.pending_ms.saturating_sub(ms);
            state.used_ms += ms;
        }
        self.windows[idx].push(ms);

        let state = &self.stages[idx];
        if state.used_ms > state.allocated_ms {
            let deficit = state.used_ms - state.allocated_ms;
            self.cascade_overrun(stage, deficit);
        } else if finalize {
            self.restitute_surplus(stage);
        }
    }

    /// Pull an overrun deficit from the buffer first, then from downstream
    /// stages in pipeline order. Total allocation is conserved: the
    /// overrunning stage gains exactly what the donors lose.
    fn cascade_overrun(&mut self, stage: Stage, deficit: u64) {
        let mut outstanding = deficit;
        let mut absorbed = 0u64;

        let buffer_idx = Stage::Buffer.index();
        let from_buffer = outstanding.min(self.stages[buffer_idx].remaining());
        if from_buffer > 0 {
            self.stages[buffer_idx].allocated_ms -= from_buffer;
            outstanding -= from_buffer;
            absorbed += from_buffer;
        }

        if outstanding > 0 {
            let after = Stage::PIPELINE
                .iter()
                .skip_while(|s| **s != stage)
                .skip(1);
            for donor in after {
                if outstanding == 0 {
                    break;
                }
                let donor_state = &mut self.stages[donor.index()];
                let take = outstanding.min(donor_state.remaining());
                if take > 0 {
                    donor_state.allocated_ms -= take;
                    outstanding -= take;
                    absorbed += take;
                }
            }
        }

        self.stages[stage.index()].allocated_ms += absorbed;
        warn!(
            stage = %stage,
            deficit_ms = deficit,
            absorbed_ms = absorbed,
            uncovered_ms = outstanding,
            "Stage overran its allocation — cascading deficit downstream"
        );
    }

    /// Return a finished stage's unspent allocation to the buffer, capped
    /// at the buffer's original size.
    fn restitute_surplus(&mut self, stage: Stage) {
        let surplus = self.stages[stage.index()].remaining();
        if surplus == 0 {
            return;
        }
        let buffer = &self.stages[Stage::Buffer.index()];
        let headroom = buffer.original_ms.saturating_sub(buffer.allocated_ms);
        let give = surplus.min(headroom);
        if give == 0 {
            return;
        }
        self.stages[stage.index()].allocated_ms -= give;
        self.stages[Stage::Buffer.index()].allocated_ms += give;
        debug!(stage = %stage, returned_ms = give, "Returned stage surplus to buffer");
    }

    /// Milliseconds left: for a stage, its unspent unreserved allocation;
    /// globally, the time until the total deadline.
    pub fn remaining(&self, stage: Option<Stage>) -> u64 {
        match stage {
            Some(stage) => self.stages[stage.index()].remaining(),
            None => self.total_ms.saturating_sub(self.global_elapsed_ms()),
        }
    }

    /// Current allocation for a stage (after any cascading).
    pub fn allocation(&self, stage: Stage) -> u64 {
        self.stages[stage.index()].allocated_ms
    }

    /// Recorded usage for a stage.
    pub fn used(&self, stage: Stage) -> u64 {
        self.stages[stage.index()].used_ms
    }

    fn global_elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Whether the global decision deadline has been reached.
    pub fn global_preempt(&self) -> bool {
        self.started_at.is_some() && self.global_elapsed_ms() >= self.total_ms
    }

    /// Whether work in `stage` must stop: either the global deadline has
    /// been reached, or the stage's elapsed time plus prior usage has
    /// consumed its allocation. Callers choose the stage explicitly; there
    /// is no implicit default.
    pub fn should_preempt(&self, stage: Stage) -> bool {
        if self.global_preempt() {
            return true;
        }
        let state = &self.stages[stage.index()];
        let running_ms = state
            .started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        state.used_ms + running_ms >= state.allocated_ms
    }

    /// Rolling latency percentiles for a stage.
    pub fn metrics_snapshot(&self, stage: Stage) -> LatencySnapshot {
        self.windows[stage.index()].snapshot()
    }

    /// Sum of all current allocations; conserved across cascades.
    pub fn total_allocated(&self) -> u64 {
        self.stages.iter().map(|s| s.allocated_ms).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
