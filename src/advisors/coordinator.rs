//! Advisor coordinator: concurrent panel queries with safety nets
//!
//! `query` fans out one timeout-bounded task per enabled advisor, validates
//! and weights the opinions that come back, and aggregates them into a
//! coarse-action distribution. Advisor-level problems never surface as
//! errors: every failed advisor is recorded in the result's failure list
//! and the decision continues with whoever answered.
//!
//! Three deadlines interact per task — the configured per-advisor timeout,
//! the remaining shared stage budget, and a caller-supplied cancellation.
//! Their minimum is computed once at task start and drives one unified
//! cancellation token per task; an upstream cancel propagates to every
//! in-flight task, a per-task timer cancels only its own.

use arc_swap::ArcSwapOption;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreaker;
use super::cost_guard::CostGuard;
use super::persona::{build_system_prompt, build_user_prompt};
use super::telemetry::QueryTelemetry;
use super::transport::{AdvisorTransport, TransportError, TransportRequest};
use super::validation::parse_opinion;
use super::weighting::{load_snapshot, save_snapshot, WeightSnapshot};
use crate::budget::{Stage, TimeBudgetTracker};
use crate::config::{AdvisorConfig, ConfigError, DecisionConfig};
use crate::types::{
    AdvisorDefinition, AdvisorFailure, AdvisorOutput, AggregatedAdvice, CalibrationSample,
    CoarseAction, FailureReason, PersonaTemplate, TableState,
};

// ============================================================================
// Query options
// ============================================================================

/// Caller-side knobs for one panel query.
#[derive(Debug, Default)]
pub struct QueryOptions {
    /// Tighten (never widen) the per-advisor timeout for this query.
    pub timeout_override_ms: Option<u64>,
    /// Upstream cancellation; fires into every in-flight task.
    pub cancel: Option<CancellationToken>,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Coordinates the advisor panel for one host. Owns the circuit breaker,
/// cost guard, and cached weight snapshot; stepped once per decision.
pub struct AdvisorCoordinator {
    panel: Vec<AdvisorDefinition>,
    personas: HashMap<String, PersonaTemplate>,
    transports: HashMap<String, Arc<dyn AdvisorTransport>>,
    weights: ArcSwapOption<WeightSnapshot>,
    cost_guard: CostGuard,
    breaker: CircuitBreaker,
    advisor_cfg: AdvisorConfig,
    verbose_telemetry: bool,
}

impl AdvisorCoordinator {
    /// Build a coordinator from configuration plus host-injected transports,
    /// keyed by backing-model id.
    ///
    /// Configuration-resolution problems are the only errors this subsystem
    /// is allowed to raise, and only here — never mid-decision.
    pub fn new(
        config: &DecisionConfig,
        transports: HashMap<String, Arc<dyn AdvisorTransport>>,
    ) -> Result<Self, ConfigError> {
        if config.advisors.panel.is_empty() {
            return Err(ConfigError::Invalid(
                "advisor panel is empty — configure at least one advisor".to_string(),
            ));
        }
        let personas = config
            .advisors
            .personas
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        Ok(Self {
            panel: config.advisors.panel.clone(),
            personas,
            transports,
            weights: ArcSwapOption::from(None),
            cost_guard: CostGuard::new(config.cost_guard.clone()),
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            advisor_cfg: config.advisors.clone(),
            verbose_telemetry: config.strategy.verbose_telemetry,
        })
    }

    /// Query the panel and aggregate the result.
    ///
    /// Never fails: advisor-level problems land in the failure list, and the
    /// worst case is an empty distribution the strategy engine treats as
    /// untrustworthy.
    pub async fn query(
        &mut self,
        state: &TableState,
        prompt_context: &str,
        options: &QueryOptions,
        budget: &mut TimeBudgetTracker,
    ) -> AggregatedAdvice {
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        self.breaker.step();
        if self.breaker.is_open() {
            debug!(request_id = %request_id, "Circuit breaker open — skipping panel query");
            let mut advice = AggregatedAdvice::empty(true);
            advice
                .notes
                .push("circuit breaker cooling down — panel not queried".to_string());
            self.emit_telemetry(&request_id, &advice, 0.0);
            return advice;
        }

        // Slot per configured advisor so fan-in mirrors configuration order
        // no matter which task finishes first.
        let mut slots: Vec<Option<Result<AdvisorOutput, AdvisorFailure>>> =
            vec![None; self.panel.len()];
        let mut runnable: Vec<(usize, TransportRequest, Arc<dyn AdvisorTransport>)> = Vec::new();

        for (index, advisor) in self.panel.iter().enumerate() {
            if !advisor.enabled {
                slots[index] = Some(Err(AdvisorFailure::new(
                    &advisor.id,
                    FailureReason::Disabled,
                    "disabled in configuration",
                )));
                continue;
            }
            let Some(persona) = self.personas.get(&advisor.persona) else {
                slots[index] = Some(Err(AdvisorFailure::new(
                    &advisor.id,
                    FailureReason::Disabled,
                    format!("persona {} not configured", advisor.persona),
                )));
                continue;
            };
            let Some(transport) = self.transports.get(&advisor.model) else {
                slots[index] = Some(Err(AdvisorFailure::new(
                    &advisor.id,
                    FailureReason::Transport,
                    format!("no transport for model {}", advisor.model),
                )));
                continue;
            };
            let request = TransportRequest {
                advisor_id: advisor.id.clone(),
                model: advisor.model.clone(),
                system_prompt: build_system_prompt(persona),
                user_prompt: build_user_prompt(state, prompt_context),
                max_tokens: persona.max_tokens,
                temperature: persona.temperature,
            };
            runnable.push((index, request, Arc::clone(transport)));
        }

        // Effective per-advisor timeout: configured ceiling, shared stage
        // budget, and caller override — whichever is smallest.
        let mut per_agent_timeout_ms = self
            .advisor_cfg
            .per_agent_timeout_ms
            .min(budget.remaining(Some(Stage::Advisors)));
        if let Some(override_ms) = options.timeout_override_ms {
            per_agent_timeout_ms = per_agent_timeout_ms.min(override_ms);
        }

        let reserved_ms = per_agent_timeout_ms;
        if reserved_ms == 0 || !budget.reserve(Stage::Advisors, reserved_ms) {
            for (index, request, _) in &runnable {
                slots[*index] = Some(Err(AdvisorFailure::new(
                    &request.advisor_id,
                    FailureReason::Timeout,
                    "insufficient budget",
                )));
            }
            return self.finish_query(&request_id, slots, started, budget, 0);
        }

        let upstream = options
            .cancel
            .clone()
            .unwrap_or_default();
        let shared_deadline = Instant::now() + Duration::from_millis(reserved_ms);

        let mut handles = Vec::with_capacity(runnable.len());
        for (index, request, transport) in runnable {
            let task_token = upstream.child_token();
            let timeout = Duration::from_millis(per_agent_timeout_ms);
            handles.push(tokio::spawn(async move {
                let outcome =
                    run_advisor_task(&request, transport, task_token, timeout, shared_deadline)
                        .await;
                (index, outcome)
            }));
        }

        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "Advisor task panicked — dropping its slot"),
            }
        }

        self.finish_query(&request_id, slots, started, budget, reserved_ms)
    }

    /// Fan-in: weight, aggregate, run the policy gates, emit telemetry.
    fn finish_query(
        &mut self,
        request_id: &str,
        slots: Vec<Option<Result<AdvisorOutput, AdvisorFailure>>>,
        started: Instant,
        budget: &mut TimeBudgetTracker,
        reserved_ms: u64,
    ) -> AggregatedAdvice {
        let snapshot = self.current_snapshot();
        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for slot in slots.into_iter().flatten() {
            match slot {
                Ok(mut output) => {
                    output.weight = snapshot.effective_weight(
                        &output.advisor_id,
                        self.advisor_cfg.full_weight_sample_threshold,
                    );
                    outputs.push(output);
                }
                Err(failure) => failures.push(failure),
            }
        }

        let distribution = aggregate_distribution(&outputs, self.advisor_cfg.min_confidence);
        let consensus = consensus_score(&distribution);
        let total_tokens: u64 = outputs.iter().map(|o| o.token_usage.total()).sum();
        let estimated_cost_usd = self.estimated_cost_usd(&outputs);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if reserved_ms > 0 {
            budget.release(Stage::Advisors, reserved_ms);
        }
        budget.record_actual(Stage::Advisors, elapsed_ms, true);

        let mut notes = Vec::new();
        let mut tripped = false;
        if let Some(trip) = self.cost_guard.evaluate(total_tokens, elapsed_ms) {
            let summary = trip.summary();
            failures.push(AdvisorFailure::new(
                "panel",
                FailureReason::CostGuard,
                summary.clone(),
            ));
            notes.push(summary);
            self.breaker.force_open();
            tripped = true;
        } else if !outputs.is_empty() {
            self.breaker.record_success();
            self.cost_guard.record_success();
        } else if !failures.is_empty() && self.breaker.record_failure() {
            notes.push("circuit breaker opened after repeated panel failures".to_string());
            tripped = true;
        }

        info!(
            request_id = %request_id,
            outputs = outputs.len(),
            failures = failures.len(),
            consensus = consensus,
            total_tokens,
            estimated_cost_usd,
            elapsed_ms,
            tripped,
            "Advisor panel query complete"
        );

        let advice = AggregatedAdvice {
            outputs,
            failures,
            distribution,
            consensus,
            circuit_breaker_tripped: tripped,
            total_tokens,
            elapsed_ms,
            notes,
        };
        self.emit_telemetry(request_id, &advice, estimated_cost_usd);
        advice
    }

    fn emit_telemetry(&self, request_id: &str, advice: &AggregatedAdvice, estimated_cost_usd: f64) {
        QueryTelemetry::build(
            request_id.to_string(),
            &advice.outputs,
            &advice.failures,
            &advice.distribution,
            advice.total_tokens,
            estimated_cost_usd,
            advice.elapsed_ms,
            self.breaker.state(),
            self.cost_guard.state(),
            self.verbose_telemetry,
        )
        .emit();
    }

    /// Dollar estimate for the panel's aggregate usage, priced by each
    /// advisor's own transport.
    fn estimated_cost_usd(&self, outputs: &[AdvisorOutput]) -> f64 {
        outputs
            .iter()
            .map(|output| {
                self.panel
                    .iter()
                    .find(|advisor| advisor.id == output.advisor_id)
                    .and_then(|advisor| self.transports.get(&advisor.model))
                    .map_or(0.0, |transport| {
                        transport.estimate_cost(&output.token_usage).estimated_cost_usd
                    })
            })
            .sum()
    }

    /// Cached weight snapshot, loaded from disk once per coordinator
    /// lifetime. Readers always see a complete snapshot: updates replace
    /// the whole Arc rather than mutating in place.
    fn current_snapshot(&self) -> Arc<WeightSnapshot> {
        if let Some(snapshot) = self.weights.load_full() {
            return snapshot;
        }
        let loaded = Arc::new(load_snapshot(
            &self.advisor_cfg.weight_snapshot_path,
            self.advisor_cfg.default_weight,
            self.advisor_cfg.weight_decay,
        ));
        self.weights.store(Some(Arc::clone(&loaded)));
        loaded
    }

    /// Offline calibration update: fold realized outcomes into the weight
    /// snapshot and persist it atomically. Invoked once outcomes are known,
    /// never on the hot decision path.
    pub fn update_weights(&self, samples: &[CalibrationSample]) -> anyhow::Result<()> {
        use anyhow::Context;

        let mut next = (*self.current_snapshot()).clone();
        next.apply_samples(samples);
        save_snapshot(&next, &self.advisor_cfg.weight_snapshot_path).with_context(|| {
            format!(
                "failed to persist weight snapshot to {}",
                self.advisor_cfg.weight_snapshot_path.display()
            )
        })?;
        info!(
            samples = samples.len(),
            entries = next.entries.len(),
            "Advisor weight snapshot updated"
        );
        self.weights.store(Some(Arc::new(next)));
        Ok(())
    }

    /// Current breaker state, for host dashboards.
    pub fn circuit_breaker_state(&self) -> super::circuit_breaker::CircuitBreakerState {
        self.breaker.state()
    }

    /// Current cost-guard state, for host dashboards.
    pub fn cost_guard_state(&self) -> super::cost_guard::CostGuardState {
        self.cost_guard.state()
    }
}

// ============================================================================
// Per-task execution
// ============================================================================

/// Run one advisor task under its unified deadline.
///
/// The effective deadline is the minimum of the per-task timeout and the
/// shared deadline remaining at task start — tasks that start late get
/// proportionally less time.
async fn run_advisor_task(
    request: &TransportRequest,
    transport: Arc<dyn AdvisorTransport>,
    task_token: CancellationToken,
    per_task_timeout: Duration,
    shared_deadline: Instant,
) -> Result<AdvisorOutput, AdvisorFailure> {
    let now = Instant::now();
    let effective = per_task_timeout.min(shared_deadline.saturating_duration_since(now));
    if effective.is_zero() {
        return Err(AdvisorFailure::new(
            &request.advisor_id,
            FailureReason::Timeout,
            "no time remaining at task start",
        ));
    }

    let invoke_token = task_token.child_token();
    let response = tokio::select! {
        () = task_token.cancelled() => {
            return Err(AdvisorFailure::new(
                &request.advisor_id,
                FailureReason::Timeout,
                "aborted by upstream cancellation",
            ));
        }
        () = tokio::time::sleep(effective) => {
            // Cancels only this task's transport, not its siblings.
            invoke_token.cancel();
            return Err(AdvisorFailure::new(
                &request.advisor_id,
                FailureReason::Timeout,
                format!("deadline of {}ms reached", effective.as_millis()),
            ));
        }
        result = transport.invoke(request, invoke_token.clone()) => match result {
            Ok(response) => response,
            Err(TransportError::Cancelled) => {
                return Err(AdvisorFailure::new(
                    &request.advisor_id,
                    FailureReason::Timeout,
                    "transport cancelled",
                ));
            }
            Err(TransportError::Request(detail)) => {
                return Err(AdvisorFailure::new(
                    &request.advisor_id,
                    FailureReason::Transport,
                    detail,
                ));
            }
        },
    };

    match parse_opinion(&response.raw_text) {
        Ok(opinion) => Ok(AdvisorOutput {
            advisor_id: request.advisor_id.clone(),
            action: opinion.action,
            confidence: opinion.confidence,
            rationale: opinion.rationale,
            token_usage: response.token_usage,
            latency_ms: response.latency_ms,
            weight: 0.0,
        }),
        Err(e) => Err(AdvisorFailure::new(
            &request.advisor_id,
            FailureReason::Validation,
            e.to_string(),
        )),
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Weighted coarse-action distribution over successful outputs.
///
/// Each advisor contributes `weight × max(confidence, floor)` to its chosen
/// action's bucket; the floor prevents a low-confidence advisor from being
/// starved to zero. Normalized to sum 1.
fn aggregate_distribution(
    outputs: &[AdvisorOutput],
    min_confidence: f64,
) -> BTreeMap<CoarseAction, f64> {
    let mut buckets: BTreeMap<CoarseAction, f64> = BTreeMap::new();
    for output in outputs {
        let contribution = output.weight * output.confidence.max(min_confidence);
        *buckets.entry(output.action).or_insert(0.0) += contribution;
    }
    let total: f64 = buckets.values().sum();
    if total <= f64::EPSILON {
        return BTreeMap::new();
    }
    for value in buckets.values_mut() {
        *value /= total;
    }
    buckets
}

/// Panel agreement: `1 − normalized Shannon entropy` of the distribution.
fn consensus_score(distribution: &BTreeMap<CoarseAction, f64>) -> f64 {
    let k = distribution.len();
    if k == 0 {
        return 0.0;
    }
    if k == 1 {
        return 1.0;
    }
    let entropy: f64 = distribution
        .values()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    1.0 - entropy / (k as f64).ln()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisors::transport::{MockReply, MockTransport};
    use crate::types::{ActionType, Street, TokenUsage};

    fn table_state() -> TableState {
        TableState {
            round_id: "hand-42".to_string(),
            street: Street::Flop,
            hero_seat: 1,
            pot: 100.0,
            amount_to_call: 20.0,
            hero_stack: 500.0,
            legal_actions: vec![ActionType::Fold, ActionType::Call, ActionType::Raise],
            legal_raise: None,
        }
    }

    fn test_config(dir: &std::path::Path) -> DecisionConfig {
        let mut config = DecisionConfig::default();
        config.advisors.weight_snapshot_path = dir.join("weights.json");
        config
    }

    fn tracker() -> TimeBudgetTracker {
        TimeBudgetTracker::with_allocations(
            8_000,
            [800, 2_500, 3_000, 700, 500, 500],
            200,
        )
    }

    fn coordinator_with(
        config: &DecisionConfig,
        transport: MockTransport,
    ) -> AdvisorCoordinator {
        let mut transports: HashMap<String, Arc<dyn AdvisorTransport>> = HashMap::new();
        transports.insert("qwen2.5-7b".to_string(), Arc::new(transport));
        AdvisorCoordinator::new(config, transports).expect("coordinator")
    }

    #[tokio::test]
    async fn aggregates_panel_in_configuration_order() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8))
            .with_reply("lag", MockReply::opinion("raise", 0.9))
            .with_reply("nit", MockReply::opinion("fold", 0.6));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        assert_eq!(advice.outputs.len(), 3);
        assert_eq!(advice.outputs[0].advisor_id, "solid-reg");
        assert_eq!(advice.outputs[1].advisor_id, "lag");
        assert_eq!(advice.outputs[2].advisor_id, "nit");
        assert!(!advice.circuit_breaker_tripped);

        let total: f64 = advice.distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(advice.distribution.values().all(|p| *p >= 0.0));
        // All three weights equal (fresh snapshot), so mass follows confidence
        assert!(advice.distribution[&CoarseAction::Raise] > advice.distribution[&CoarseAction::Fold]);
    }

    #[tokio::test]
    async fn panel_cost_is_priced_by_the_advisors_transport() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8).with_tokens(100, 50))
            .with_reply("lag", MockReply::opinion("raise", 0.9).with_tokens(200, 50))
            .with_reply("nit", MockReply::opinion("fold", 0.6).with_tokens(50, 50));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        // 500 tokens at the mock's 2e-6 USD/token
        assert_eq!(advice.total_tokens, 500);
        let cost = coordinator.estimated_cost_usd(&advice.outputs);
        assert!((cost - 500.0 * 2e-6).abs() < 1e-12);
    }

    #[tokio::test]
    async fn validation_failure_is_recorded_not_raised() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8))
            .with_reply("lag", MockReply::garbage("I would shove all my chips"))
            .with_reply("nit", MockReply::failing());
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        assert_eq!(advice.outputs.len(), 1);
        assert_eq!(advice.failures.len(), 2);
        assert_eq!(advice.failures[0].reason, FailureReason::Validation);
        assert_eq!(advice.failures[1].reason, FailureReason::Transport);
    }

    #[tokio::test]
    async fn disabled_advisor_fails_without_a_task() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut config = test_config(dir.path());
        config.advisors.panel[1].enabled = false;
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8))
            .with_reply("nit", MockReply::opinion("fold", 0.5));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        assert_eq!(advice.outputs.len(), 2);
        assert_eq!(advice.failures.len(), 1);
        assert_eq!(advice.failures[0].advisor_id, "lag");
        assert_eq!(advice.failures[0].reason, FailureReason::Disabled);
    }

    #[tokio::test]
    async fn slow_advisor_times_out_without_blocking_the_panel() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut config = test_config(dir.path());
        config.advisors.per_agent_timeout_ms = 50;
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8))
            .with_reply("lag", MockReply::opinion("raise", 0.9).with_delay(5_000))
            .with_reply("nit", MockReply::opinion("fold", 0.5));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        assert_eq!(advice.outputs.len(), 2);
        assert_eq!(advice.failures.len(), 1);
        assert_eq!(advice.failures[0].advisor_id, "lag");
        assert_eq!(advice.failures[0].reason, FailureReason::Timeout);
    }

    #[tokio::test]
    async fn upstream_cancellation_fails_all_tasks() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8).with_delay(2_000))
            .with_reply("lag", MockReply::opinion("raise", 0.9).with_delay(2_000))
            .with_reply("nit", MockReply::opinion("fold", 0.5).with_delay(2_000));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = QueryOptions {
            timeout_override_ms: None,
            cancel: Some(cancel),
        };

        let advice = coordinator
            .query(&table_state(), "", &options, &mut budget)
            .await;

        assert!(advice.outputs.is_empty());
        assert_eq!(advice.failures.len(), 3);
        assert!(advice
            .failures
            .iter()
            .all(|f| f.reason == FailureReason::Timeout));
    }

    #[tokio::test]
    async fn exhausted_budget_fails_tasks_with_insufficient_budget() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8));
        let mut coordinator = coordinator_with(&config, transport);
        // Advisors stage has nothing left
        let mut budget =
            TimeBudgetTracker::with_allocations(8_000, [800, 2_500, 0, 700, 500, 0], 200);

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        assert!(advice.outputs.is_empty());
        assert_eq!(advice.failures.len(), 3);
        assert!(advice.failures.iter().all(|f| f.detail == "insufficient budget"));
    }

    #[tokio::test]
    async fn cost_guard_trip_reports_and_opens_breaker() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut config = test_config(dir.path());
        config.cost_guard.per_decision_token_cap = 100;
        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8).with_tokens(400, 200))
            .with_reply("lag", MockReply::opinion("raise", 0.9).with_tokens(0, 0))
            .with_reply("nit", MockReply::opinion("fold", 0.5).with_tokens(0, 0));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        // 600 aggregated tokens against a 100-token cap
        assert!(advice.circuit_breaker_tripped);
        assert!(advice.notes.iter().any(|n| n.contains("cost guard")));
        assert!(advice
            .failures
            .iter()
            .any(|f| f.reason == FailureReason::CostGuard));
    }

    #[tokio::test]
    async fn repeated_failures_trip_breaker_on_second_decision() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut config = test_config(dir.path());
        config.advisors.panel.truncate(1);
        config.circuit_breaker.failure_threshold = 2;
        let transport =
            MockTransport::new().with_reply("solid-reg", MockReply::garbage("not json"));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let first = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;
        assert!(!first.circuit_breaker_tripped);
        assert_eq!(first.failures[0].reason, FailureReason::Validation);

        let mut budget = tracker();
        let second = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;
        assert!(second.circuit_breaker_tripped);

        // While cooling down, the panel is not queried at all.
        let mut budget = tracker();
        let third = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;
        assert!(third.circuit_breaker_tripped);
        assert!(third.outputs.is_empty());
        assert!(third.failures.is_empty());
    }

    #[tokio::test]
    async fn weight_snapshot_loaded_once_and_applied() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());

        // Seed a snapshot where "lag" has fully converged to a high weight.
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        for _ in 0..25 {
            snapshot.apply_samples(&[CalibrationSample {
                advisor_id: "lag".to_string(),
                predicted: 1.0,
                outcome: 1.0,
            }]);
        }
        save_snapshot(&snapshot, &config.advisors.weight_snapshot_path).expect("save");

        let transport = MockTransport::new()
            .with_reply("solid-reg", MockReply::opinion("call", 0.8))
            .with_reply("lag", MockReply::opinion("raise", 0.8))
            .with_reply("nit", MockReply::opinion("fold", 0.8));
        let mut coordinator = coordinator_with(&config, transport);
        let mut budget = tracker();

        let advice = coordinator
            .query(&table_state(), "", &QueryOptions::default(), &mut budget)
            .await;

        let lag = advice
            .outputs
            .iter()
            .find(|o| o.advisor_id == "lag")
            .expect("lag output");
        let reg = advice
            .outputs
            .iter()
            .find(|o| o.advisor_id == "solid-reg")
            .expect("reg output");
        // "lag" converged past its threshold to a learned weight above the
        // default; "solid-reg" has no history and gets the default exactly.
        assert!(lag.weight > reg.weight);
        assert!((reg.weight - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn update_weights_persists_and_swaps_snapshot() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let config = test_config(dir.path());
        let transport = MockTransport::new();
        let coordinator = coordinator_with(&config, transport);

        coordinator
            .update_weights(&[CalibrationSample {
                advisor_id: "solid-reg".to_string(),
                predicted: 0.9,
                outcome: 1.0,
            }])
            .expect("update");

        let reloaded = load_snapshot(&config.advisors.weight_snapshot_path, 0.5, 0.9);
        assert_eq!(reloaded.entries["solid-reg"].sample_count, 1);
    }

    #[test]
    fn empty_panel_is_a_construction_error() {
        let mut config = DecisionConfig::default();
        config.advisors.panel.clear();
        let result = AdvisorCoordinator::new(&config, HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn consensus_is_one_for_unanimous_panel() {
        let mut dist = BTreeMap::new();
        dist.insert(CoarseAction::Call, 1.0);
        assert!((consensus_score(&dist) - 1.0).abs() < 1e-12);

        let mut split = BTreeMap::new();
        split.insert(CoarseAction::Call, 0.5);
        split.insert(CoarseAction::Raise, 0.5);
        // Even two-way split: zero consensus
        assert!(consensus_score(&split).abs() < 1e-12);
    }

    #[test]
    fn aggregation_floors_confidence() {
        let output = |id: &str, action, confidence| AdvisorOutput {
            advisor_id: id.to_string(),
            action,
            confidence,
            rationale: String::new(),
            token_usage: TokenUsage::default(),
            latency_ms: 0,
            weight: 0.5,
        };
        let outputs = vec![
            output("a", CoarseAction::Call, 0.0),
            output("b", CoarseAction::Raise, 0.9),
        ];
        let dist = aggregate_distribution(&outputs, 0.05);
        // Zero-confidence advisor still contributes the floor
        assert!(dist[&CoarseAction::Call] > 0.0);
        let total: f64 = dist.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
