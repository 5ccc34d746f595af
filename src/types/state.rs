//! External input types: table snapshot and solver distribution
//!
//! Both are produced outside the decision core — the table snapshot by the
//! perception layer, the solver distribution by the remote equilibrium
//! service. The core treats them as already-validated typed inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::ActionType;
use super::action::Street;

// ============================================================================
// Table snapshot
// ============================================================================

/// Legal raise envelope for the hero seat.
///
/// `amounts` carries the discrete legal raise totals when the table enforces
/// a fixed ladder; an empty list means any amount within `[min, max]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegalRaise {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub amounts: Vec<f64>,
}

/// Structured snapshot of the table at decision time.
///
/// Produced by the perception layer and confidence-gated before it reaches
/// the decision core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableState {
    /// Stable identifier for this hand/round, used for seed derivation.
    pub round_id: String,
    /// Current betting street.
    pub street: Street,
    /// Hero's seat index.
    pub hero_seat: u8,
    /// Current pot size in chips.
    pub pot: f64,
    /// Chips required for hero to call.
    pub amount_to_call: f64,
    /// Hero's remaining stack.
    pub hero_stack: f64,
    /// Action types currently legal for hero.
    pub legal_actions: Vec<ActionType>,
    /// Raise envelope, present only when raising is legal.
    pub legal_raise: Option<LegalRaise>,
}

impl TableState {
    /// Whether `action_type` is currently legal for hero.
    pub fn is_legal(&self, action_type: ActionType) -> bool {
        self.legal_actions.contains(&action_type)
    }

    /// Whether any aggressive action (bet/raise/all-in) is legal.
    pub fn can_raise(&self) -> bool {
        self.legal_actions.iter().any(|a| a.is_aggressive())
    }
}

// ============================================================================
// Solver distribution
// ============================================================================

/// Per-action output of the equilibrium solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SolverEntry {
    /// Mixed-strategy frequency for this action, in [0, 1].
    pub frequency: f64,
    /// Expected value in big blinds.
    pub ev: f64,
    /// Residual regret at the end of solving.
    pub regret: f64,
}

/// Solver output: canonical action key → per-action stats.
///
/// Keys use the `ActionKey` string encoding. A `BTreeMap` keeps iteration
/// order deterministic, which the seeded selector depends on.
pub type SolverDistribution = BTreeMap<String, SolverEntry>;

/// Extract and renormalize the frequency mass of a solver distribution.
///
/// Non-positive and non-finite frequencies are discarded. Returns an empty
/// map when no usable mass remains.
pub fn normalized_frequencies(solver: &SolverDistribution) -> BTreeMap<String, f64> {
    let mut probs: BTreeMap<String, f64> = BTreeMap::new();
    let mut total = 0.0;
    for (key, entry) in solver {
        if entry.frequency.is_finite() && entry.frequency > 0.0 {
            probs.insert(key.clone(), entry.frequency);
            total += entry.frequency;
        }
    }
    if total <= f64::EPSILON {
        return BTreeMap::new();
    }
    for value in probs.values_mut() {
        *value /= total;
    }
    probs
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(frequency: f64) -> SolverEntry {
        SolverEntry { frequency, ev: 0.0, regret: 0.0 }
    }

    #[test]
    fn normalization_discards_invalid_entries() {
        let mut solver = SolverDistribution::new();
        solver.insert("flop:0:call:0.00".to_string(), entry(0.6));
        solver.insert("flop:0:fold:0.00".to_string(), entry(-0.1));
        solver.insert("flop:0:raise:50.00".to_string(), entry(f64::NAN));
        solver.insert("flop:0:raise:75.00".to_string(), entry(0.2));

        let probs = normalized_frequencies(&solver);
        assert_eq!(probs.len(), 2);
        let total: f64 = probs.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((probs["flop:0:call:0.00"] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn normalization_of_empty_mass_yields_empty_map() {
        let mut solver = SolverDistribution::new();
        solver.insert("flop:0:fold:0.00".to_string(), entry(0.0));
        assert!(normalized_frequencies(&solver).is_empty());
    }
}
