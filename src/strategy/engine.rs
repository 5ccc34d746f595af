//! Strategy engine: ordered decision gates over the blended policy
//!
//! `decide` runs three gates: untrusted advisor input falls back to the
//! solver alone; an exhausted time budget produces a preempted solver-only
//! decision; otherwise the normal blend → select → size path runs. Every
//! terminal decision passes through the injected risk controller, and every
//! failure inside a gate is recovered locally into a valid decision — the
//! engine always emits a legal action, and only configuration errors at
//! construction time are allowed to surface.
//!
//! Determinism: the categorical draw is seeded from a stable hash of
//! `(round_id, session_id)` (or an explicit configured override), so two
//! runs over identical inputs reproduce the same decision byte for byte.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use super::blend::blend_distributions;
use super::divergence::{audit_divergence, coarse_divergence_pct};
use super::fallback::{safe_action, should_use_solver_only};
use super::risk::RiskController;
use super::select::select_action;
use super::sizing::size_action;
use crate::budget::{Stage, TimeBudgetTracker};
use crate::config::StrategyConfig;
use crate::types::{
    normalized_frequencies, AggregatedAdvice, BlendedDistribution, CoarseAction, FallbackReason,
    GameAction, SolverDistribution, StrategyDecision, Street, TableState, TimingBreakdown,
};

/// Decision orchestrator for one table session.
pub struct StrategyEngine<R: RiskController> {
    config: StrategyConfig,
    config_digest: String,
    risk: R,
}

/// Intermediate result of one gate, before the risk check and audit
/// assembly shared by every path.
struct DecisionDraft {
    action: GameAction,
    action_key: String,
    blended: BlendedDistribution,
    fallback_reason: Option<FallbackReason>,
    used_solver_only_fallback: bool,
    preempted: bool,
    notes: Vec<String>,
}

impl<R: RiskController> StrategyEngine<R> {
    pub fn new(config: StrategyConfig, risk: R) -> Self {
        let config_digest = digest_config(&config);
        Self { config, config_digest, risk }
    }

    /// Begin a session on the injected risk controller.
    pub fn start_session(&mut self, session_id: &str) {
        self.risk.start_session(session_id);
    }

    /// Produce the audited decision for one round.
    pub fn decide(
        &mut self,
        state: &TableState,
        solver: &SolverDistribution,
        advice: Option<&AggregatedAdvice>,
        session_id: &str,
        budget: &mut TimeBudgetTracker,
    ) -> StrategyDecision {
        let started = Instant::now();
        let seed = self.derive_seed(&state.round_id, session_id);
        let mut rng = StdRng::seed_from_u64(seed);

        let solver_probs = normalized_frequencies(solver);
        let advisor_dist: BTreeMap<CoarseAction, f64> = advice
            .map(|a| a.distribution.clone())
            .unwrap_or_default();

        let divergence_pct = coarse_divergence_pct(&solver_probs, &advisor_dist);
        audit_divergence(
            divergence_pct,
            self.config.divergence_log_threshold_pct,
            &state.round_id,
        );

        let draft = if should_use_solver_only(advice) {
            let mut draft = self.solver_only_draft(state, &solver_probs, &mut rng, false);
            draft
                .notes
                .push("advisor output unusable — solver-only decision".to_string());
            draft
        } else if budget.global_preempt() || budget.should_preempt(Stage::Synthesis) {
            let mut draft = self.solver_only_draft(state, &solver_probs, &mut rng, true);
            draft
                .notes
                .push("time budget exhausted — preempted solver-only decision".to_string());
            draft
        } else {
            self.normal_draft(state, &solver_probs, &advisor_dist, &mut rng)
        };

        self.finish(
            draft,
            state,
            solver_probs,
            advisor_dist,
            divergence_pct,
            seed,
            session_id,
            advice,
            started,
            budget,
        )
    }

    // ------------------------------------------------------------------------
    // Gates
    // ------------------------------------------------------------------------

    /// Gate 3: blend, select, size.
    fn normal_draft(
        &self,
        state: &TableState,
        solver_probs: &BTreeMap<String, f64>,
        advisor_dist: &BTreeMap<CoarseAction, f64>,
        rng: &mut StdRng,
    ) -> DecisionDraft {
        let mut notes = Vec::new();
        let blended = match blend_distributions(solver_probs, advisor_dist, self.config.alpha) {
            Some(blended) => blended,
            None => {
                if solver_probs.is_empty() {
                    return self.safe_draft(state, FallbackReason::SolverDistributionEmpty, false);
                }
                notes.push("blend degenerated — using pure solver distribution".to_string());
                BlendedDistribution::solver_only(solver_probs.clone())
            }
        };

        let Some((key, action)) = select_action(&blended.probs, state, rng) else {
            return self.safe_draft(state, FallbackReason::SelectionFailed, false);
        };

        match size_action(action, state, &self.grid_for(state.street)) {
            Ok(sized) => DecisionDraft {
                action: sized,
                action_key: key,
                blended,
                fallback_reason: None,
                used_solver_only_fallback: false,
                preempted: false,
                notes,
            },
            Err(e) => {
                let mut draft = self.safe_draft(state, FallbackReason::SelectionFailed, false);
                draft.notes.push(format!("sizing failed: {e}"));
                draft.notes.append(&mut notes);
                draft
            }
        }
    }

    /// Solver-only decision: renormalized solver frequencies, sampled and
    /// sized exactly like the normal path, alpha pinned at 1.0.
    fn solver_only_draft(
        &self,
        state: &TableState,
        solver_probs: &BTreeMap<String, f64>,
        rng: &mut StdRng,
        preempted: bool,
    ) -> DecisionDraft {
        let fallback_reason = preempted.then_some(FallbackReason::DeadlinePreempt);

        if solver_probs.is_empty() {
            let mut draft =
                self.safe_draft(state, FallbackReason::SolverDistributionEmpty, true);
            draft.preempted = preempted;
            return draft;
        }

        let Some((key, action)) = select_action(solver_probs, state, rng) else {
            let mut draft =
                self.safe_draft(state, FallbackReason::SolverSelectionInvalid, true);
            draft.preempted = preempted;
            return draft;
        };

        match size_action(action, state, &self.grid_for(state.street)) {
            Ok(sized) => DecisionDraft {
                action: sized,
                action_key: key,
                blended: BlendedDistribution::solver_only(solver_probs.clone()),
                fallback_reason,
                used_solver_only_fallback: true,
                preempted,
                notes: Vec::new(),
            },
            Err(e) => {
                let mut draft =
                    self.safe_draft(state, FallbackReason::SolverSizingFailed, true);
                draft.preempted = preempted;
                draft.notes.push(format!("sizing failed: {e}"));
                draft
            }
        }
    }

    /// Terminal recovery: zero-distribution decision carrying the safe action.
    /// `solver_only` comes from the calling gate, so a normal-path failure
    /// does not claim the solver decided alone.
    fn safe_draft(
        &self,
        state: &TableState,
        reason: FallbackReason,
        solver_only: bool,
    ) -> DecisionDraft {
        debug!(round_id = %state.round_id, reason = %reason, "Falling back to safe action");
        DecisionDraft {
            action: safe_action(state),
            action_key: String::new(),
            blended: BlendedDistribution::empty(),
            fallback_reason: Some(reason),
            used_solver_only_fallback: solver_only,
            preempted: false,
            notes: vec![format!("safe action fallback: {reason}")],
        }
    }

    // ------------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------------

    /// Risk gate plus audit-record assembly, shared by every path.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        draft: DecisionDraft,
        state: &TableState,
        solver_probs: BTreeMap<String, f64>,
        advisor_dist: BTreeMap<CoarseAction, f64>,
        divergence_pct: f64,
        seed: u64,
        session_id: &str,
        advice: Option<&AggregatedAdvice>,
        started: Instant,
        budget: &mut TimeBudgetTracker,
    ) -> StrategyDecision {
        let DecisionDraft {
            mut action,
            action_key,
            blended,
            mut fallback_reason,
            used_solver_only_fallback,
            preempted,
            mut notes,
        } = draft;

        let risk = self.risk.check(&action, state);
        if !risk.approved {
            let replacement = safe_action(state);
            notes.push(format!(
                "risk violation: {} — replaced {} with {}",
                risk.violation.as_deref().unwrap_or("unspecified"),
                action.action_type,
                replacement.action_type,
            ));
            action = replacement;
            fallback_reason = Some(FallbackReason::RiskViolation);
        }

        if let Some(advice) = advice {
            notes.extend(advice.notes.iter().cloned());
        }

        let synthesis_ms = started.elapsed().as_millis() as u64;
        budget.record_actual(Stage::Synthesis, synthesis_ms, true);
        let advisor_ms = advice.map(|a| a.elapsed_ms).unwrap_or(0);

        let decision = StrategyDecision {
            action,
            action_key,
            solver_distribution: solver_probs,
            advisor_distribution: advisor_dist,
            blended,
            divergence_pct,
            risk,
            fallback_reason,
            used_solver_only_fallback,
            preempted,
            seed,
            configured_alpha: self.config.alpha,
            config_digest: self.config_digest.clone(),
            session_id: session_id.to_string(),
            timing: TimingBreakdown {
                advisor_ms,
                synthesis_ms,
                total_ms: advisor_ms + synthesis_ms,
            },
            notes,
        };

        info!(
            round_id = %state.round_id,
            action = %decision.action.action_type,
            amount = decision.action.amount,
            seed = decision.seed,
            solver_only = decision.used_solver_only_fallback,
            preempted = decision.preempted,
            fallback = decision.fallback_reason.map(|r| r.to_string()).unwrap_or_default(),
            divergence_pct = decision.divergence_pct,
            "Decision finalized"
        );
        decision
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Seed for the categorical draw: configured override, else a stable
    /// hash of `(round_id, session_id)`.
    fn derive_seed(&self, round_id: &str, session_id: &str) -> u64 {
        if let Some(seed) = self.config.seed_override {
            return seed;
        }
        let digest = md5::compute(format!("{round_id}:{session_id}"));
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        u64::from_le_bytes(bytes)
    }

    fn grid_for(&self, street: Street) -> Vec<f64> {
        self.config
            .raise_fraction_grids
            .get(&street.to_string())
            .cloned()
            .unwrap_or_default()
    }
}

/// Stable digest of the strategy configuration for the audit record.
///
/// Serialized through JSON (map keys are `BTreeMap`-ordered, so the bytes
/// are deterministic) and hashed, so two decisions under identical tuning
/// carry identical digests.
fn digest_config(config: &StrategyConfig) -> String {
    serde_json::to_vec(config)
        .map(|bytes| format!("{:x}", md5::compute(bytes)))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
