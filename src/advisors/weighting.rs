//! Advisor trust weights: persisted calibration snapshot
//!
//! Provides the versioned `WeightSnapshot` mapping advisor ids to learned
//! trust weights, enabling:
//! - Disk persistence (atomic write-temp-then-rename)
//! - Lazy load once per coordinator lifetime
//! - Offline calibration updates from realized outcomes
//!
//! A missing or corrupt snapshot file yields a fresh default snapshot,
//! never an error — the hot decision path cannot fail on weight state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::types::CalibrationSample;

/// Snapshot format version for forward compatibility.
const SNAPSHOT_VERSION: u32 = 1;

/// Calibration floor/ceiling for a single squared error.
const ERROR_CLAMP: (f64, f64) = (0.001, 1.0);

// ============================================================================
// Snapshot types
// ============================================================================

/// Learned trust state for one advisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightEntry {
    /// Trust weight in (0, 1], derived as `1 / (1 + calibration_score)`.
    pub weight: f64,
    /// Exponentially decayed squared calibration error.
    pub calibration_score: f64,
    /// Outcomes observed for this advisor.
    pub sample_count: u64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

/// Versioned, persisted mapping advisor id → trust state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightSnapshot {
    pub version: u32,
    pub updated_at: i64,
    /// Decay factor applied to the old score on each new sample.
    pub decay_factor: f64,
    /// Weight used for advisors with no history.
    pub default_weight: f64,
    pub entries: BTreeMap<String, WeightEntry>,
}

impl WeightSnapshot {
    /// A fresh snapshot with no learned entries.
    pub fn fresh(default_weight: f64, decay_factor: f64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: chrono::Utc::now().timestamp(),
            decay_factor,
            default_weight,
            entries: BTreeMap::new(),
        }
    }

    /// Effective trust weight for an advisor.
    ///
    /// Interpolates between the snapshot default and the learned weight by
    /// `min(1, sample_count / full_weight_sample_threshold)`: new advisors
    /// start at the default and converge to their learned weight as
    /// evidence accumulates. An advisor with zero samples gets the default
    /// weight exactly.
    pub fn effective_weight(&self, advisor_id: &str, full_weight_sample_threshold: u64) -> f64 {
        let Some(entry) = self.entries.get(advisor_id) else {
            return self.default_weight;
        };
        let threshold = full_weight_sample_threshold.max(1) as f64;
        let blend = (entry.sample_count as f64 / threshold).min(1.0);
        self.default_weight * (1.0 - blend) + entry.weight * blend
    }

    /// Fold realized outcomes into the snapshot.
    ///
    /// Per sample: `error = clamp((predicted − outcome)², [0.001, 1])`;
    /// the advisor's score becomes the error itself on first observation,
    /// then `old·decay + error·(1−decay)`; the weight is `1/(1+score)`.
    pub fn apply_samples(&mut self, samples: &[CalibrationSample]) {
        let now = chrono::Utc::now().timestamp();
        for sample in samples {
            let diff = sample.predicted - sample.outcome;
            let error = (diff * diff).clamp(ERROR_CLAMP.0, ERROR_CLAMP.1);
            if !error.is_finite() {
                warn!(
                    advisor = %sample.advisor_id,
                    predicted = sample.predicted,
                    outcome = sample.outcome,
                    "Skipping non-finite calibration sample"
                );
                continue;
            }

            let entry = self
                .entries
                .entry(sample.advisor_id.clone())
                .or_insert(WeightEntry {
                    weight: self.default_weight,
                    calibration_score: 0.0,
                    sample_count: 0,
                    updated_at: now,
                });

            entry.calibration_score = if entry.sample_count == 0 {
                error
            } else {
                entry.calibration_score * self.decay_factor + error * (1.0 - self.decay_factor)
            };
            entry.weight = 1.0 / (1.0 + entry.calibration_score);
            entry.sample_count += 1;
            entry.updated_at = now;
        }
        self.updated_at = now;
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Load a snapshot from disk, falling back to a fresh default snapshot on
/// any problem. Weight state must never take down a decision.
pub fn load_snapshot(path: &Path, default_weight: f64, decay_factor: f64) -> WeightSnapshot {
    match std::fs::read(path) {
        Ok(data) => match serde_json::from_slice::<WeightSnapshot>(&data) {
            Ok(snapshot) => {
                debug!(
                    path = %path.display(),
                    entries = snapshot.entries.len(),
                    "Loaded advisor weight snapshot"
                );
                snapshot
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Corrupt weight snapshot — starting fresh"
                );
                WeightSnapshot::fresh(default_weight, decay_factor)
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No weight snapshot yet — starting fresh");
            WeightSnapshot::fresh(default_weight, decay_factor)
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to read weight snapshot — starting fresh"
            );
            WeightSnapshot::fresh(default_weight, decay_factor)
        }
    }
}

/// Save a snapshot to disk atomically (write temp file, then rename).
pub fn save_snapshot(snapshot: &WeightSnapshot, path: &Path) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(advisor_id: &str, predicted: f64, outcome: f64) -> CalibrationSample {
        CalibrationSample {
            advisor_id: advisor_id.to_string(),
            predicted,
            outcome,
        }
    }

    #[test]
    fn unknown_advisor_gets_default_weight_exactly() {
        let snapshot = WeightSnapshot::fresh(0.5, 0.9);
        assert!((snapshot.effective_weight("ghost", 20) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn first_sample_score_is_clamped_squared_error() {
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        snapshot.apply_samples(&[sample("a", 0.9, 0.0)]);

        let entry = &snapshot.entries["a"];
        assert!((entry.calibration_score - 0.81).abs() < 1e-12);
        assert!((entry.weight - 1.0 / 1.81).abs() < 1e-12);
        assert_eq!(entry.sample_count, 1);

        // A perfect prediction still hits the 0.001 floor
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        snapshot.apply_samples(&[sample("b", 1.0, 1.0)]);
        assert!((snapshot.entries["b"].calibration_score - 0.001).abs() < 1e-12);
    }

    #[test]
    fn later_samples_decay_exponentially() {
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        snapshot.apply_samples(&[sample("a", 1.0, 0.0)]); // error 1.0
        snapshot.apply_samples(&[sample("a", 0.5, 0.5)]); // error floor 0.001

        let expected = 1.0 * 0.9 + 0.001 * 0.1;
        let entry = &snapshot.entries["a"];
        assert!((entry.calibration_score - expected).abs() < 1e-12);
        assert_eq!(entry.sample_count, 2);
    }

    #[test]
    fn effective_weight_converges_with_sample_count() {
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        for _ in 0..10 {
            snapshot.apply_samples(&[sample("a", 1.0, 1.0)]);
        }
        // 10 of 20 samples: halfway between default and learned weight
        let learned = snapshot.entries["a"].weight;
        let expected = 0.5 * 0.5 + learned * 0.5;
        assert!((snapshot.effective_weight("a", 20) - expected).abs() < 1e-9);

        for _ in 0..10 {
            snapshot.apply_samples(&[sample("a", 1.0, 1.0)]);
        }
        let learned = snapshot.entries["a"].weight;
        assert!((snapshot.effective_weight("a", 20) - learned).abs() < 1e-9);
    }

    #[test]
    fn save_load_round_trip_preserves_entries() {
        let mut snapshot = WeightSnapshot::fresh(0.5, 0.9);
        snapshot.apply_samples(&[
            sample("a", 0.8, 1.0),
            sample("b", 0.2, 0.0),
            sample("a", 0.7, 1.0),
        ]);

        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("weights.json");
        save_snapshot(&snapshot, &path).expect("save");

        let loaded = load_snapshot(&path, 0.5, 0.9);
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn missing_or_corrupt_file_yields_fresh_snapshot() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let missing = dir.path().join("nope.json");
        let fresh = load_snapshot(&missing, 0.4, 0.8);
        assert!(fresh.entries.is_empty());
        assert!((fresh.default_weight - 0.4).abs() < f64::EPSILON);

        let corrupt = dir.path().join("bad.json");
        std::fs::write(&corrupt, b"{not json").expect("write");
        let fresh = load_snapshot(&corrupt, 0.4, 0.8);
        assert!(fresh.entries.is_empty());
    }
}
