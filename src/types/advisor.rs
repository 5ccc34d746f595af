//! Advisor panel types: definitions, personas, outputs, failures, aggregate
//!
//! An advisor is an external recommendation source (typically model-backed)
//! that answers with a coarse action and a confidence. The coordinator
//! aggregates a panel of them into a weighted action distribution; this
//! module holds the shared vocabulary for that exchange.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::CoarseAction;

// ============================================================================
// Configuration-side identity
// ============================================================================

/// A configured member of the advisor panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisorDefinition {
    /// Stable identifier, also the key into the weight snapshot.
    pub id: String,
    /// Backing-model identifier passed to the transport.
    pub model: String,
    /// Persona template id resolved at query time.
    pub persona: String,
    /// Disabled advisors produce a `disabled` failure instead of a task.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Prompt-construction parameters for one advisor persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaTemplate {
    /// Persona id referenced from `AdvisorDefinition`.
    pub id: String,
    /// Voice/attitude line injected into the system prompt.
    pub tone: String,
    /// Playing-style guidelines injected into the system prompt.
    pub guidelines: Vec<String>,
    /// Generation cap forwarded to the transport.
    pub max_tokens: u32,
    /// Sampling temperature forwarded to the transport.
    pub temperature: f64,
}

// ============================================================================
// Per-advisor results
// ============================================================================

/// Token accounting for one transport invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A validated, weighted opinion from one advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorOutput {
    pub advisor_id: String,
    /// Recommended coarse action.
    pub action: CoarseAction,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Free-text rationale. Redacted in telemetry unless verbose logging is on.
    pub rationale: String,
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
    /// Trust weight applied during aggregation (snapshot-interpolated).
    pub weight: f64,
}

/// Why an advisor produced no usable opinion this decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Task exceeded its effective deadline or was cancelled upstream.
    Timeout,
    /// Transport answered but the response failed schema validation.
    Validation,
    /// Transport-level error (connection, status code, missing transport).
    Transport,
    /// The cost guard rejected the panel's aggregate usage.
    CostGuard,
    /// The circuit breaker was open; no query was attempted.
    CircuitBreaker,
    /// Advisor is disabled in configuration.
    Disabled,
    Unknown,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Validation => write!(f, "validation"),
            FailureReason::Transport => write!(f, "transport"),
            FailureReason::CostGuard => write!(f, "cost_guard"),
            FailureReason::CircuitBreaker => write!(f, "circuit_breaker"),
            FailureReason::Disabled => write!(f, "disabled"),
            FailureReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Failed advisor attempt: who and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorFailure {
    pub advisor_id: String,
    pub reason: FailureReason,
    /// Short human-readable detail for the audit trail.
    pub detail: String,
}

impl AdvisorFailure {
    pub fn new(advisor_id: impl Into<String>, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            advisor_id: advisor_id.into(),
            reason,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Aggregated panel result
// ============================================================================

/// Aggregated result of one panel query.
///
/// Never an error at the advisor level: failed advisors land in `failures`,
/// the distribution carries whatever mass the successes produced, and the
/// strategy engine decides whether that is enough to trust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedAdvice {
    /// Successful outputs, in configuration order.
    pub outputs: Vec<AdvisorOutput>,
    /// Failed attempts, in configuration order.
    pub failures: Vec<AdvisorFailure>,
    /// Weighted coarse-action distribution, normalized to sum 1.
    /// Empty when no advisor succeeded.
    pub distribution: BTreeMap<CoarseAction, f64>,
    /// Panel agreement: `1 − normalized Shannon entropy` of the distribution.
    pub consensus: f64,
    /// True when the breaker was open at query start or tripped during it.
    pub circuit_breaker_tripped: bool,
    /// Total tokens consumed by successful outputs.
    pub total_tokens: u64,
    /// Wall-clock duration of the whole query.
    pub elapsed_ms: u64,
    /// Audit notes (cost-guard trips, breaker transitions, budget denials).
    pub notes: Vec<String>,
}

impl AggregatedAdvice {
    /// An empty result used for short-circuit paths.
    pub fn empty(circuit_breaker_tripped: bool) -> Self {
        Self {
            outputs: Vec::new(),
            failures: Vec::new(),
            distribution: BTreeMap::new(),
            consensus: 0.0,
            circuit_breaker_tripped,
            total_tokens: 0,
            elapsed_ms: 0,
            notes: Vec::new(),
        }
    }
}

// ============================================================================
// Calibration
// ============================================================================

/// One realized outcome for offline weight calibration.
///
/// `predicted` is the confidence the advisor reported; `outcome` is 1.0 when
/// the recommended action matched the winning line, 0.0 otherwise (or any
/// graded score in between supplied by the session bookkeeper).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub advisor_id: String,
    pub predicted: f64,
    pub outcome: f64,
}

// ============================================================================
// Tests
// ============================================================================
