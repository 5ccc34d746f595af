//! Seeded categorical action selection
//!
//! Sampling is a cumulative-sum draw over the blended distribution using the
//! decision's seeded generator. `BTreeMap` iteration order plus the seed make
//! the draw reproducible; a small tolerance and a deterministic last-key
//! tie-break absorb floating-point edge cases at the top of the cumulative
//! sum. The sampled key is decoded and re-validated against the table's
//! current legal actions — distributions can outlive the state they were
//! computed from.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{ActionKey, GameAction, TableState};

/// Tolerance for the cumulative-sum comparison.
const DRAW_EPSILON: f64 = 1e-9;

/// Draw one key from the distribution. `None` only when the distribution is
/// empty.
pub fn sample_key(probs: &BTreeMap<String, f64>, rng: &mut StdRng) -> Option<String> {
    if probs.is_empty() {
        return None;
    }
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    let mut last_key = None;
    for (key, p) in probs {
        cumulative += p;
        if draw < cumulative + DRAW_EPSILON {
            return Some(key.clone());
        }
        last_key = Some(key);
    }
    // Cumulative sum fell short of the draw by floating-point error.
    last_key.cloned()
}

/// Sample, decode, and legality-check one action from the distribution.
///
/// `None` covers every failure: empty distribution, undecodable key, or a
/// sampled action the table no longer allows. Callers route `None` to the
/// safe-action fallback.
pub fn select_action(
    probs: &BTreeMap<String, f64>,
    state: &TableState,
    rng: &mut StdRng,
) -> Option<(String, GameAction)> {
    let key = sample_key(probs, rng)?;
    let decoded = match ActionKey::decode(&key) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(key = %key, error = %e, "Sampled key failed to decode");
            return None;
        }
    };
    if !state.is_legal(decoded.action_type) {
        debug!(
            key = %key,
            action = %decoded.action_type,
            "Sampled action no longer legal"
        );
        return None;
    }
    Some((key, decoded.to_action()))
}

// ============================================================================
// Tests
// ============================================================================
