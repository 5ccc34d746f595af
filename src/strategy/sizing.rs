//! Raise sizing: grid snap, legality clamp, ladder snap
//!
//! Only raise-family actions are adjusted. The requested amount is expressed
//! as a fraction of `pot + amount_to_call`, snapped to the street's
//! configured fraction grid, clamped to the table's legal raise envelope
//! (and the hero stack), then snapped to the nearest discrete legal amount
//! when the table enforces a ladder. Non-raise actions pass through
//! unchanged.

use crate::types::{GameAction, TableState};

/// Sizing failures, routed to the safe-action fallback by the caller.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SizingError {
    #[error("raise requested but no legal raise envelope is present")]
    NoLegalRaise,
    #[error("sizing arithmetic produced a non-finite amount from {0}")]
    NonFinite(f64),
    #[error("sizing grid for street is empty")]
    EmptyGrid,
}

/// Size one candidate action against the current table state.
pub fn size_action(
    action: GameAction,
    state: &TableState,
    grid: &[f64],
) -> Result<GameAction, SizingError> {
    if !action.action_type.is_aggressive() {
        return Ok(action);
    }
    let amount = size_raise(action.amount, state, grid)?;
    Ok(GameAction::new(action.action_type, amount))
}

/// Compute the final raise amount for a requested raw amount.
fn size_raise(requested: f64, state: &TableState, grid: &[f64]) -> Result<f64, SizingError> {
    let Some(envelope) = &state.legal_raise else {
        return Err(SizingError::NoLegalRaise);
    };
    if grid.is_empty() {
        return Err(SizingError::EmptyGrid);
    }
    if !requested.is_finite() {
        return Err(SizingError::NonFinite(requested));
    }

    let base = state.pot + state.amount_to_call;
    if !base.is_finite() || base <= 0.0 {
        return Err(SizingError::NonFinite(base));
    }

    let fraction = requested / base;
    let snapped_fraction = nearest(grid.iter().copied(), fraction)
        .ok_or(SizingError::EmptyGrid)?;
    let mut amount = snapped_fraction * base;

    let ceiling = envelope.max.min(state.hero_stack);
    amount = amount.clamp(envelope.min, ceiling.max(envelope.min));
    if !amount.is_finite() {
        return Err(SizingError::NonFinite(amount));
    }

    if !envelope.amounts.is_empty() {
        amount = nearest(envelope.amounts.iter().copied(), amount)
            .ok_or(SizingError::NoLegalRaise)?;
    }
    Ok(amount)
}

/// Nearest value to `target` in the iterator; ties keep the earlier value.
fn nearest(values: impl Iterator<Item = f64>, target: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for value in values {
        let distance = (value - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((value, distance)),
        }
    }
    best.map(|(value, _)| value)
}

// ============================================================================
// Tests
// ============================================================================
