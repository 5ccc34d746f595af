//! Structured telemetry for advisor panel queries
//!
//! Exactly one record per query, emitted through `tracing` as a JSON field
//! so downstream collectors can ship it unchanged. Advisor rationale is
//! free text from a model and may echo hole cards or reads, so it is
//! redacted unless verbose telemetry is enabled in configuration.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::circuit_breaker::CircuitBreakerState;
use super::cost_guard::CostGuardState;
use crate::types::{AdvisorFailure, AdvisorOutput, CoarseAction};

/// Redaction marker substituted for rationale text.
const REDACTED: &str = "[redacted]";

/// Output entry as it appears in telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryOutput {
    pub advisor_id: String,
    pub action: CoarseAction,
    pub confidence: f64,
    pub rationale: String,
    pub tokens: u64,
    pub latency_ms: u64,
    pub weight: f64,
}

impl TelemetryOutput {
    fn from_output(output: &AdvisorOutput, verbose: bool) -> Self {
        Self {
            advisor_id: output.advisor_id.clone(),
            action: output.action,
            confidence: output.confidence,
            rationale: if verbose {
                output.rationale.clone()
            } else {
                REDACTED.to_string()
            },
            tokens: output.token_usage.total(),
            latency_ms: output.latency_ms,
            weight: output.weight,
        }
    }
}

/// Aggregate cost view for one query.
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub total_tokens: u64,
    /// Dollar estimate priced by each advisor's own transport.
    pub estimated_cost_usd: f64,
    pub elapsed_ms: u64,
}

/// One structured record per panel query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryTelemetry {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub request_id: String,
    pub outputs: Vec<TelemetryOutput>,
    pub failures: Vec<AdvisorFailure>,
    pub distribution: BTreeMap<CoarseAction, f64>,
    pub cost_summary: CostSummary,
    pub circuit_breaker_state: CircuitBreakerState,
    pub cost_guard_state: CostGuardState,
}

impl QueryTelemetry {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        request_id: String,
        outputs: &[AdvisorOutput],
        failures: &[AdvisorFailure],
        distribution: &BTreeMap<CoarseAction, f64>,
        total_tokens: u64,
        estimated_cost_usd: f64,
        elapsed_ms: u64,
        circuit_breaker_state: CircuitBreakerState,
        cost_guard_state: CostGuardState,
        verbose: bool,
    ) -> Self {
        Self {
            record_type: "advisor_query",
            request_id,
            outputs: outputs
                .iter()
                .map(|o| TelemetryOutput::from_output(o, verbose))
                .collect(),
            failures: failures.to_vec(),
            distribution: distribution.clone(),
            cost_summary: CostSummary { total_tokens, estimated_cost_usd, elapsed_ms },
            circuit_breaker_state,
            cost_guard_state,
        }
    }

    /// Emit the record through the tracing pipeline.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => info!(
                target: "tablepilot::telemetry",
                request_id = %self.request_id,
                outputs = self.outputs.len(),
                failures = self.failures.len(),
                record = %json,
                "Advisor query telemetry"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize telemetry record"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
