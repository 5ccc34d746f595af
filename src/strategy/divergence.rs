//! Solver/advisor divergence audit
//!
//! Total-variation distance between the solver view (collapsed to the coarse
//! vocabulary) and the advisor distribution, in percentage points. Computed
//! every decision and logged past a configured threshold — observability
//! only, never a gate.

use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{ActionKey, CoarseAction};

/// Total-variation distance in percentage points between the solver and
/// advisor distributions, both viewed at coarse-action granularity.
///
/// Returns 0.0 when the advisor distribution is empty: no disagreement can
/// be measured against an absent opinion.
pub fn coarse_divergence_pct(
    solver_probs: &BTreeMap<String, f64>,
    advisor: &BTreeMap<CoarseAction, f64>,
) -> f64 {
    if advisor.is_empty() {
        return 0.0;
    }

    let mut solver_coarse: BTreeMap<CoarseAction, f64> = BTreeMap::new();
    let mut total = 0.0;
    for (key, mass) in solver_probs {
        if let Ok(decoded) = ActionKey::decode(key) {
            *solver_coarse.entry(decoded.action_type.coarse()).or_insert(0.0) += mass;
            total += mass;
        }
    }
    if total > f64::EPSILON {
        for value in solver_coarse.values_mut() {
            *value /= total;
        }
    }

    let tv: f64 = CoarseAction::ALL
        .iter()
        .map(|action| {
            let s = solver_coarse.get(action).copied().unwrap_or(0.0);
            let a = advisor.get(action).copied().unwrap_or(0.0);
            (s - a).abs()
        })
        .sum::<f64>()
        / 2.0;
    tv * 100.0
}

/// Log the divergence when it crosses the configured threshold.
pub fn audit_divergence(divergence_pct: f64, threshold_pct: f64, round_id: &str) {
    if divergence_pct > threshold_pct {
        warn!(
            round_id = %round_id,
            divergence_pct,
            threshold_pct,
            "Solver and advisor panel disagree beyond threshold"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
