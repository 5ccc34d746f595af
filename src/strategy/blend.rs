//! Solver/advisor distribution blending
//!
//! The solver speaks in canonical action keys with discrete raise sizes;
//! advisors speak in coarse actions. Blending maps the coarse advisor mass
//! onto the solver's key space — coarse "raise" mass is split across the
//! solver's raise-size keys proportionally to each key's solver mass, or
//! evenly when the solver assigns no raise mass — then mixes
//! `alpha·solver + (1−alpha)·advisor` per key and renormalizes.

use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{ActionKey, BlendedDistribution, CoarseAction};

/// Mix the normalized solver distribution with the advisor coarse
/// distribution at the given alpha.
///
/// Advisor mass on a coarse action the solver has no key for is dropped
/// before mixing; the result is renormalized so it still sums to 1. Returns
/// `None` when the mix carries no usable mass, in which case the caller
/// falls back to the pure solver distribution with alpha forced to 1.0.
pub fn blend_distributions(
    solver_probs: &BTreeMap<String, f64>,
    advisor: &BTreeMap<CoarseAction, f64>,
    alpha: f64,
) -> Option<BlendedDistribution> {
    let advisor_on_keys = project_advisor_mass(solver_probs, advisor);

    let solver_weight: f64 = solver_probs.values().sum();
    let advisor_weight: f64 = advisor_on_keys.values().sum();

    let mut probs: BTreeMap<String, f64> = BTreeMap::new();
    for key in solver_probs.keys().chain(advisor_on_keys.keys()) {
        if probs.contains_key(key) {
            continue;
        }
        let s = solver_probs.get(key).copied().unwrap_or(0.0);
        let a = advisor_on_keys.get(key).copied().unwrap_or(0.0);
        let mixed = alpha * s + (1.0 - alpha) * a;
        if mixed.is_finite() && mixed > 0.0 {
            probs.insert(key.clone(), mixed);
        }
    }

    let total: f64 = probs.values().sum();
    if total <= f64::EPSILON {
        return None;
    }
    for value in probs.values_mut() {
        *value /= total;
    }

    Some(BlendedDistribution {
        probs,
        alpha,
        solver_weight,
        advisor_weight,
    })
}

/// Project coarse advisor mass onto the solver's key space.
///
/// Per coarse action: mass is split across the solver keys that collapse to
/// that action, proportionally to their solver mass (evenly when the group
/// carries none). Coarse actions with no matching key lose their mass.
fn project_advisor_mass(
    solver_probs: &BTreeMap<String, f64>,
    advisor: &BTreeMap<CoarseAction, f64>,
) -> BTreeMap<String, f64> {
    // Group decodable solver keys by the coarse action they collapse to.
    let mut groups: BTreeMap<CoarseAction, Vec<(&String, f64)>> = BTreeMap::new();
    for (key, mass) in solver_probs {
        match ActionKey::decode(key) {
            Ok(decoded) => groups
                .entry(decoded.action_type.coarse())
                .or_default()
                .push((key, *mass)),
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable solver key excluded from blend");
            }
        }
    }

    let mut projected: BTreeMap<String, f64> = BTreeMap::new();
    for (coarse, mass) in advisor {
        if !mass.is_finite() || *mass <= 0.0 {
            continue;
        }
        let Some(group) = groups.get(coarse) else {
            continue;
        };
        let group_mass: f64 = group.iter().map(|(_, m)| *m).sum();
        for (key, key_mass) in group {
            let share = if group_mass > f64::EPSILON {
                key_mass / group_mass
            } else {
                1.0 / group.len() as f64
            };
            *projected.entry((*key).clone()).or_insert(0.0) += mass * share;
        }
    }
    projected
}

// ============================================================================
// Tests
// ============================================================================
