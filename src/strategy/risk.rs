//! Risk controller seam
//!
//! Session bankroll bookkeeping lives outside this crate; the engine only
//! needs a gate it can run every terminal decision through. Hosts inject
//! their controller; the no-op controller keeps tests and solver-only
//! deployments honest about the interface.

use crate::types::{GameAction, RiskCheckOutcome, RiskSnapshot, TableState};

/// Session risk gate consulted before any action is emitted.
pub trait RiskController: Send {
    /// Begin a session. Called once before the first decision.
    fn start_session(&mut self, session_id: &str);

    /// Check one candidate action. A rejected action is replaced by the
    /// engine's safe action; the outcome travels in the decision trace
    /// either way.
    fn check(&mut self, action: &GameAction, state: &TableState) -> RiskCheckOutcome;

    /// Current session snapshot for the audit trail.
    fn snapshot(&self) -> RiskSnapshot;
}

/// Controller that approves everything while counting decisions.
#[derive(Debug, Default)]
pub struct NoopRiskController {
    snapshot: RiskSnapshot,
}

impl RiskController for NoopRiskController {
    fn start_session(&mut self, _session_id: &str) {
        self.snapshot = RiskSnapshot::default();
    }

    fn check(&mut self, _action: &GameAction, _state: &TableState) -> RiskCheckOutcome {
        self.snapshot.decisions += 1;
        RiskCheckOutcome::approved(self.snapshot.clone())
    }

    fn snapshot(&self) -> RiskSnapshot {
        self.snapshot.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, Street};

    #[test]
    fn noop_controller_approves_and_counts() {
        let state = TableState {
            round_id: "r1".to_string(),
            street: Street::River,
            hero_seat: 0,
            pot: 10.0,
            amount_to_call: 0.0,
            hero_stack: 100.0,
            legal_actions: vec![ActionType::Check],
            legal_raise: None,
        };
        let mut controller = NoopRiskController::default();
        controller.start_session("s1");
        let outcome = controller.check(&GameAction::simple(ActionType::Check), &state);
        assert!(outcome.approved);
        assert_eq!(outcome.snapshot.decisions, 1);
        let outcome = controller.check(&GameAction::simple(ActionType::Check), &state);
        assert_eq!(outcome.snapshot.decisions, 2);
    }
}
