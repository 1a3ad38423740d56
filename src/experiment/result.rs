//! Experiment Result - parsed name joined with extracted metrics

use serde::{Deserialize, Serialize};

use super::{ExperimentName, Hyperparameters, MetricsRecord};

/// Experiment Result is the union of one decoded name and one metrics
/// record, tagged with the group whose log directory it came from.
///
/// Created once per completed log file and never mutated afterwards.
/// `exp_name` is the log file stem exactly as found on disk, which may
/// differ from the canonical rendering of `name` (`exp_1_..._dr0.10`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    group: String,
    exp_name: String,
    name: ExperimentName,
    metrics: MetricsRecord,
}

impl ExperimentResult {
    /// Join a decoded name with its metrics, keyed by the canonical name.
    #[must_use]
    pub fn new(group: impl Into<String>, name: ExperimentName, metrics: MetricsRecord) -> Self {
        Self {
            group: group.into(),
            exp_name: name.to_string(),
            name,
            metrics,
        }
    }

    /// Decode a log file stem and join it with its metrics.
    ///
    /// Returns `None` when the stem is not an experiment name.
    #[must_use]
    pub fn from_stem(group: impl Into<String>, stem: &str, metrics: MetricsRecord) -> Option<Self> {
        let name = ExperimentName::parse(stem)?;
        Some(Self {
            group: group.into(),
            exp_name: stem.to_string(),
            name,
            metrics,
        })
    }

    /// Get the group label.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the experiment name as it appears in the log file name.
    #[must_use]
    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    /// Get the decoded experiment name.
    #[must_use]
    pub const fn name(&self) -> &ExperimentName {
        &self.name
    }

    /// Get the decoded hyperparameters.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        self.name.hyperparameters()
    }

    /// Get the extracted metrics.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsRecord {
        &self.metrics
    }

    /// Generalization gap: final val loss minus final train loss.
    #[must_use]
    pub fn gap(&self) -> Option<f64> {
        Some(self.metrics.final_val_loss()? - self.metrics.final_train_loss()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> ExperimentName {
        ExperimentName::parse("exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1").unwrap()
    }

    #[test]
    fn test_gap() {
        let mut builder = MetricsRecord::builder();
        builder.push_evaluation(10, 2.0, 2.5);
        let result = ExperimentResult::new("member1", name(), builder.build());

        let gap = result.gap().unwrap();
        assert!((gap - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_stem_keeps_raw_stem() {
        let stem = "exp_1_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.10";
        let result = ExperimentResult::from_stem("member1", stem, MetricsRecord::new()).unwrap();

        assert_eq!(result.exp_name(), stem);
        assert_eq!(result.name(), &name());
        assert_eq!(result.name().index(), 1);
        assert!(ExperimentResult::from_stem("member1", "notes", MetricsRecord::new()).is_none());
    }

    #[test]
    fn test_new_uses_canonical_name() {
        let result = ExperimentResult::new("member1", name(), MetricsRecord::new());
        assert_eq!(result.exp_name(), "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1");
    }

    #[test]
    fn test_gap_unset_without_evaluations() {
        let result = ExperimentResult::new("member1", name(), MetricsRecord::new());
        assert!(result.gap().is_none());
    }
}
