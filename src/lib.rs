//! TablePilot: Poker Decision Core
//!
//! Decision engine for an automated poker agent: one legal action per round,
//! inside a hard wall-clock deadline, from a solver recommendation plus an
//! unreliable panel of model-backed advisors.
//!
//! ## Architecture
//!
//! - **Budget**: per-stage wall-clock allocation with overrun cascading
//! - **Advisors**: concurrent panel queries, adaptive trust weights, cost
//!   guard and circuit breaker
//! - **Strategy**: blend → select → size → risk gate, with guaranteed safe
//!   fallbacks and deterministic replay

pub mod advisors;
pub mod budget;
pub mod config;
pub mod strategy;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, DecisionConfig};

// Re-export commonly used types
pub use types::{
    ActionKey, ActionType, AggregatedAdvice, CoarseAction, FallbackReason, GameAction,
    SolverDistribution, StrategyDecision, Street, TableState,
};

// Re-export the pipeline entry points
pub use advisors::{AdvisorCoordinator, AdvisorTransport, QueryOptions};
pub use budget::{Stage, TimeBudgetTracker};
pub use strategy::{NoopRiskController, RiskController, StrategyEngine};
