//! Decision Configuration Module
//!
//! Provides all decision-core tunables loaded from TOML, replacing any
//! hardcoded thresholds with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `TABLEPILOT_CONFIG` environment variable (path to TOML file)
//! 2. `tablepilot.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(DecisionConfig::load()?);
//!
//! // Anywhere in the codebase:
//! let alpha = config::get().strategy.alpha;
//! ```

mod decision_config;

pub use decision_config::*;

use std::sync::OnceLock;

/// Global decision configuration, initialized once at startup.
static DECISION_CONFIG: OnceLock<DecisionConfig> = OnceLock::new();

/// Initialize the global decision configuration.
///
/// Must be called exactly once before any calls to `get()`. A second call
/// is logged and ignored.
pub fn init(config: DecisionConfig) {
    if DECISION_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global decision configuration.
///
/// Panics if `init()` has not been called. A missing config is a fatal
/// startup error, not a recoverable condition.
#[allow(clippy::expect_used)]
pub fn get() -> &'static DecisionConfig {
    DECISION_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized.
///
/// Useful for tests and optional config paths.
pub fn is_initialized() -> bool {
    DECISION_CONFIG.get().is_some()
}
