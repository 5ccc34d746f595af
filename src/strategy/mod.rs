//! Strategy engine: blending, selection, sizing, and risk gating
//!
//! Turns the solver distribution and the advisor panel's aggregate into one
//! audited, legal action. The engine is gate-structured and failure-total:
//! any path that cannot complete degrades to a safer one, ending at a
//! guaranteed safe action.

pub mod blend;
pub mod divergence;
pub mod engine;
pub mod fallback;
pub mod risk;
pub mod select;
pub mod sizing;

pub use blend::blend_distributions;
pub use divergence::coarse_divergence_pct;
pub use engine::StrategyEngine;
pub use fallback::{safe_action, should_use_solver_only};
pub use risk::{NoopRiskController, RiskController};
pub use select::{sample_key, select_action};
pub use sizing::{size_action, SizingError};
