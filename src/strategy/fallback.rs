//! Fallback policy: untrusted-advisor detection and the safe action
//!
//! Centralizes the two judgments the engine leans on when the primary path
//! cannot run: whether the advisor result is trustworthy at all, and what
//! the most conservative legal action is when nothing else can be emitted.

use tracing::debug;

use crate::types::{ActionType, AggregatedAdvice, GameAction, TableState};

/// Whether the decision must ignore the advisor panel and rely on the
/// solver alone: output absent, breaker tripped, or zero usable outputs.
pub fn should_use_solver_only(advice: Option<&AggregatedAdvice>) -> bool {
    match advice {
        None => true,
        Some(advice) => advice.circuit_breaker_tripped || advice.outputs.is_empty(),
    }
}

/// The most conservative action the table currently allows.
///
/// Preference order: check (no commitment), fold (decline), then the first
/// legal action as a last resort. A state with no legal actions at all gets
/// a synthetic fold — the engine must always emit something.
pub fn safe_action(state: &TableState) -> GameAction {
    if state.is_legal(ActionType::Check) {
        return GameAction::simple(ActionType::Check);
    }
    if state.is_legal(ActionType::Fold) {
        return GameAction::simple(ActionType::Fold);
    }
    if let Some(first) = state.legal_actions.first() {
        let amount = match first {
            ActionType::Call => state.amount_to_call,
            _ => 0.0,
        };
        return GameAction::new(*first, amount);
    }
    debug!(round_id = %state.round_id, "No legal actions in snapshot — emitting synthetic fold");
    GameAction::simple(ActionType::Fold)
}

// ============================================================================
// Tests
// ============================================================================
