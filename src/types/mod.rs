//! Shared data structures for the poker decision core
//!
//! This module defines the types flowing through the decision pipeline:
//!
//! - `action`: streets, action vocabulary, canonical `ActionKey` encoding
//! - `state`: table snapshot and solver distribution inputs
//! - `advisor`: panel definitions, outputs, failures, aggregated advice
//! - `decision`: blended distribution, fallback taxonomy, audit record

pub mod action;
pub mod advisor;
pub mod decision;
pub mod state;

pub use action::{ActionKey, ActionKeyError, ActionType, CoarseAction, GameAction, Street};
pub use advisor::{
    AdvisorDefinition, AdvisorFailure, AdvisorOutput, AggregatedAdvice, CalibrationSample,
    FailureReason, PersonaTemplate, TokenUsage,
};
pub use decision::{
    BlendedDistribution, FallbackReason, RiskCheckOutcome, RiskSnapshot, StrategyDecision,
    TimingBreakdown,
};
pub use state::{normalized_frequencies, LegalRaise, SolverDistribution, SolverEntry, TableState};
