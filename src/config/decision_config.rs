//! Decision Configuration - All decision-core tunables as TOML values
//!
//! Every threshold the pipeline consults is a field in this module. Each
//! struct implements `Default`, ensuring the core runs with sane values
//! when no config file is present. Validation happens once at load time;
//! nothing downstream re-checks configuration mid-decision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::{AdvisorDefinition, PersonaTemplate};

/// Errors raised while loading or validating configuration.
///
/// These are the only errors in the crate allowed to surface to the host:
/// they happen at setup time, never mid-decision.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the decision core.
///
/// Load with `DecisionConfig::load()` which searches:
/// 1. `$TABLEPILOT_CONFIG` env var
/// 2. `./tablepilot.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionConfig {
    /// Wall-clock budget allocation per pipeline stage
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Advisor panel composition and query tuning
    #[serde(default)]
    pub advisors: AdvisorConfig,

    /// Token/latency spending limits
    #[serde(default)]
    pub cost_guard: CostGuardConfig,

    /// Consecutive-failure cooldown
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Blending, sizing, and audit tuning
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl DecisionConfig {
    /// Load configuration using the standard search order, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("TABLEPILOT_CONFIG") {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "Loading config from TABLEPILOT_CONFIG");
            return Self::load_from(&path);
        }

        let local = Path::new("tablepilot.toml");
        if local.exists() {
            info!(path = %local.display(), "Loading config from working directory");
            return Self::load_from(local);
        }

        info!("No config file found — using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// Alpha outside the trust band is rejected here rather than clamped,
    /// so a misconfigured deployment fails loudly at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if s.alpha_min >= s.alpha_max {
            return Err(ConfigError::Invalid(format!(
                "alpha trust band is empty: [{}, {}]",
                s.alpha_min, s.alpha_max
            )));
        }
        if s.alpha < s.alpha_min || s.alpha > s.alpha_max {
            return Err(ConfigError::Invalid(format!(
                "alpha {} outside trust band [{}, {}]",
                s.alpha, s.alpha_min, s.alpha_max
            )));
        }
        for (street, grid) in &s.raise_fraction_grids {
            if grid.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "raise fraction grid for {street} is empty"
                )));
            }
            if grid.iter().any(|f| !f.is_finite() || *f <= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "raise fraction grid for {street} contains non-positive values"
                )));
            }
        }
        if self.budget.total_ms == 0 {
            return Err(ConfigError::Invalid("total budget must be > 0".to_string()));
        }
        if self.advisors.per_agent_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "advisor timeout must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.advisors.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence {} outside [0, 1]",
                self.advisors.min_confidence
            )));
        }
        if !(0.0..1.0).contains(&self.advisors.weight_decay) {
            return Err(ConfigError::Invalid(format!(
                "weight_decay {} outside [0, 1)",
                self.advisors.weight_decay
            )));
        }

        for advisor in &self.advisors.panel {
            if !self.advisors.personas.iter().any(|p| p.id == advisor.persona) {
                warn!(
                    advisor = %advisor.id,
                    persona = %advisor.persona,
                    "Advisor references unknown persona — it will fail as disabled at query time"
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// Budget
// ============================================================================

/// Per-stage wall-clock ceilings in milliseconds.
///
/// The stage ceilings plus `buffer_ms` make up the total decision budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Hard wall-clock deadline for the whole decision.
    pub total_ms: u64,
    pub perception_ms: u64,
    pub solver_ms: u64,
    pub advisors_ms: u64,
    pub synthesis_ms: u64,
    pub execution_ms: u64,
    /// Shared slack absorbed first by any overrunning stage.
    pub buffer_ms: u64,
    /// Rolling window size for per-stage latency percentiles.
    pub metrics_window: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_ms: 8_000,
            perception_ms: 800,
            solver_ms: 2_500,
            advisors_ms: 3_000,
            synthesis_ms: 700,
            execution_ms: 500,
            buffer_ms: 500,
            metrics_window: 200,
        }
    }
}

// ============================================================================
// Advisors
// ============================================================================

/// Advisor panel composition and query tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Panel members, in the order results are reported.
    #[serde(default = "default_panel")]
    pub panel: Vec<AdvisorDefinition>,
    /// Persona templates referenced by panel members.
    #[serde(default = "default_personas")]
    pub personas: Vec<PersonaTemplate>,
    /// Per-advisor timeout ceiling; the effective deadline is the minimum of
    /// this, the remaining shared budget, and any caller override.
    pub per_agent_timeout_ms: u64,
    /// Confidence floor so low-confidence advisors never aggregate to zero.
    pub min_confidence: f64,
    /// Samples required before an advisor's learned weight fully replaces
    /// the snapshot default.
    pub full_weight_sample_threshold: u64,
    /// Weight assigned to advisors with no calibration history.
    pub default_weight: f64,
    /// Exponential decay factor for calibration error updates.
    pub weight_decay: f64,
    /// Persisted weight snapshot location.
    pub weight_snapshot_path: PathBuf,
}

fn default_panel() -> Vec<AdvisorDefinition> {
    vec![
        AdvisorDefinition {
            id: "solid-reg".to_string(),
            model: "qwen2.5-7b".to_string(),
            persona: "solid-reg".to_string(),
            enabled: true,
        },
        AdvisorDefinition {
            id: "lag".to_string(),
            model: "qwen2.5-7b".to_string(),
            persona: "lag".to_string(),
            enabled: true,
        },
        AdvisorDefinition {
            id: "nit".to_string(),
            model: "qwen2.5-7b".to_string(),
            persona: "nit".to_string(),
            enabled: true,
        },
    ]
}

fn default_personas() -> Vec<PersonaTemplate> {
    crate::advisors::persona::builtin_personas()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            panel: default_panel(),
            personas: default_personas(),
            per_agent_timeout_ms: 2_500,
            min_confidence: 0.05,
            full_weight_sample_threshold: 20,
            default_weight: 0.5,
            weight_decay: 0.9,
            weight_snapshot_path: PathBuf::from("data/advisor_weights.json"),
        }
    }
}

// ============================================================================
// Cost guard
// ============================================================================

/// Token and latency spending limits for the advisor panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostGuardConfig {
    /// Token cap per decision across the whole panel.
    pub per_decision_token_cap: u64,
    /// Token cap per day. The window is the UTC calendar day, reset at
    /// midnight UTC — not a sliding 24 hours, so spend just before midnight
    /// does not count against the next day.
    pub daily_token_cap: u64,
    /// Panel wall-clock ceiling before the guard trips.
    pub max_latency_ms: u64,
}

impl Default for CostGuardConfig {
    fn default() -> Self {
        Self {
            per_decision_token_cap: 4_000,
            daily_token_cap: 500_000,
            max_latency_ms: 6_000,
        }
    }
}

// ============================================================================
// Circuit breaker
// ============================================================================

/// Consecutive-failure cooldown for the advisor panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed decisions before the breaker opens.
    pub failure_threshold: u32,
    /// Cooldown length measured in decisions, not wall-clock.
    pub cooldown_decisions: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_decisions: 3,
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// Blending, sizing, and audit tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Solver share of the blend: `alpha·solver + (1−alpha)·advisor`.
    pub alpha: f64,
    /// Lower bound of the alpha trust band (inclusive).
    pub alpha_min: f64,
    /// Upper bound of the alpha trust band (inclusive).
    pub alpha_max: f64,
    /// Raise-size fractions of `(pot + amount_to_call)` per street.
    #[serde(default = "default_fraction_grids")]
    pub raise_fraction_grids: BTreeMap<String, Vec<f64>>,
    /// Divergence above this many percentage points is logged.
    pub divergence_log_threshold_pct: f64,
    /// Explicit seed override for offline replay; None derives from
    /// (round_id, session_id).
    #[serde(default)]
    pub seed_override: Option<u64>,
    /// Include advisor rationale text in telemetry records.
    #[serde(default)]
    pub verbose_telemetry: bool,
}

fn default_fraction_grids() -> BTreeMap<String, Vec<f64>> {
    let mut grids = BTreeMap::new();
    grids.insert("preflop".to_string(), vec![2.0, 2.5, 3.0, 4.0]);
    grids.insert("flop".to_string(), vec![0.33, 0.5, 0.75, 1.0]);
    grids.insert("turn".to_string(), vec![0.5, 0.75, 1.0, 1.5]);
    grids.insert("river".to_string(), vec![0.5, 0.75, 1.0, 1.5, 2.0]);
    grids
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            alpha_min: 0.3,
            alpha_max: 0.9,
            raise_fraction_grids: default_fraction_grids(),
            divergence_log_threshold_pct: 25.0,
            seed_override: None,
            verbose_telemetry: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
