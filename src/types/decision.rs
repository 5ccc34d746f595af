//! Decision output types: blended distribution, fallback taxonomy, audit record
//!
//! `StrategyDecision` is the audit/replay artifact of the whole pipeline.
//! Given an identical seed and identical inputs it must reproduce exactly,
//! which is what makes offline divergence testing possible. Wall-clock
//! timings are carried for observability but excluded from that guarantee.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::{CoarseAction, GameAction};

// ============================================================================
// Blended distribution
// ============================================================================

/// Probability mapping over canonical action keys after solver/advisor mixing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendedDistribution {
    /// Per-key probabilities, normalized to sum 1.
    pub probs: BTreeMap<String, f64>,
    /// Mixing coefficient actually used (forced to 1.0 on blend fallback).
    pub alpha: f64,
    /// Total solver mass before mixing.
    pub solver_weight: f64,
    /// Total advisor mass before mixing.
    pub advisor_weight: f64,
}

impl BlendedDistribution {
    /// Pure-solver distribution used by fallback paths.
    pub fn solver_only(probs: BTreeMap<String, f64>) -> Self {
        Self {
            probs,
            alpha: 1.0,
            solver_weight: 1.0,
            advisor_weight: 0.0,
        }
    }

    /// Zero-mass distribution carried by safe-action decisions.
    pub fn empty() -> Self {
        Self {
            probs: BTreeMap::new(),
            alpha: 1.0,
            solver_weight: 0.0,
            advisor_weight: 0.0,
        }
    }
}

// ============================================================================
// Fallback taxonomy
// ============================================================================

/// Why a decision left the primary blend/select/size path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Solver distribution had no usable mass.
    SolverDistributionEmpty,
    /// Solver-only sampling produced a key with no legal counterpart.
    SolverSelectionInvalid,
    /// Sizing failed on the solver-only path.
    SolverSizingFailed,
    /// Sampling/decoding failed on the normal path.
    SelectionFailed,
    /// The risk controller rejected the candidate action.
    RiskViolation,
    /// The time budget forced a preempted decision.
    DeadlinePreempt,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::SolverDistributionEmpty => write!(f, "solver_distribution_empty"),
            FallbackReason::SolverSelectionInvalid => write!(f, "solver_selection_invalid"),
            FallbackReason::SolverSizingFailed => write!(f, "solver_sizing_failed"),
            FallbackReason::SelectionFailed => write!(f, "selection_failed"),
            FallbackReason::RiskViolation => write!(f, "risk_violation"),
            FallbackReason::DeadlinePreempt => write!(f, "deadline_preempt"),
        }
    }
}

// ============================================================================
// Risk gate outcome
// ============================================================================

/// Opaque snapshot of the session risk controller for the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskSnapshot {
    /// Session net result in big blinds.
    pub session_net_bb: f64,
    /// Decisions taken this session.
    pub decisions: u64,
    /// Whether the controller has halted aggressive play.
    pub halted: bool,
}

/// Result of running the candidate action through the risk controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskCheckOutcome {
    pub approved: bool,
    /// Violation description when `approved` is false.
    pub violation: Option<String>,
    pub snapshot: RiskSnapshot,
}

impl RiskCheckOutcome {
    pub fn approved(snapshot: RiskSnapshot) -> Self {
        Self { approved: true, violation: None, snapshot }
    }
}

// ============================================================================
// Audit record
// ============================================================================

/// Per-stage wall-clock timings for one decision.
///
/// Observability only — excluded from the reproducibility guarantee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub advisor_ms: u64,
    pub synthesis_ms: u64,
    pub total_ms: u64,
}

/// Final audited decision for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDecision {
    /// The single legal action to emit.
    pub action: GameAction,
    /// Canonical key of the sampled action (empty for synthetic safe actions).
    pub action_key: String,
    /// Normalized solver frequency distribution used as input.
    pub solver_distribution: BTreeMap<String, f64>,
    /// Raw advisor coarse-action distribution used as input.
    pub advisor_distribution: BTreeMap<CoarseAction, f64>,
    /// Post-mix distribution the action was sampled from.
    pub blended: BlendedDistribution,
    /// Total-variation distance between solver and advisor views, in
    /// percentage points. Zero when no advisor distribution was available.
    pub divergence_pct: f64,
    /// Risk gate verdict for the emitted action.
    pub risk: RiskCheckOutcome,
    /// Set whenever a non-primary path produced this decision.
    pub fallback_reason: Option<FallbackReason>,
    /// True when advisor input was absent/untrusted and the solver decided alone.
    pub used_solver_only_fallback: bool,
    /// True when the time budget preempted the normal path.
    pub preempted: bool,
    /// Seed driving the categorical draw, for byte-identical replay.
    pub seed: u64,
    /// Mixing coefficient from configuration (before any fallback override).
    pub configured_alpha: f64,
    /// Digest of the full strategy configuration in effect, so a replay can
    /// verify it ran under the same grids, trust band, and thresholds.
    pub config_digest: String,
    /// Session identifier the seed was derived from.
    pub session_id: String,
    pub timing: TimingBreakdown,
    /// Free-form audit notes from every stage that deviated.
    pub notes: Vec<String>,
}
