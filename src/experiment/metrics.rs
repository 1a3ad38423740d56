//! Metrics Record - values scraped from one training log

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Training loss reported at one iteration (`iter <n>: loss <x>`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationLoss {
    /// Iteration number
    pub iter: u64,
    /// Training loss at that iteration
    pub loss: f64,
}

/// Train/val loss pair reported at one evaluation step
/// (`step <n>: train loss <x>, val loss <y>`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalPoint {
    /// Evaluation step
    pub step: u64,
    /// Training loss at that step
    pub train_loss: f64,
    /// Validation loss at that step
    pub val_loss: f64,
}

/// Metrics Record holds everything extracted from one log artifact.
///
/// Histories keep first-to-last order of appearance. Scalar fields are
/// `None` when their pattern never matched; they are never defaulted
/// to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    iterations: Vec<IterationLoss>,
    evaluations: Vec<EvalPoint>,
    num_parameters: Option<f64>,
    duration: Option<f64>,
}

impl MetricsRecord {
    /// Create an empty record (no matches).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for assembling a record line by line.
    #[must_use]
    pub fn builder() -> MetricsRecordBuilder {
        MetricsRecordBuilder::default()
    }

    /// Per-iteration training losses in order of appearance.
    #[must_use]
    pub fn iterations(&self) -> &[IterationLoss] {
        &self.iterations
    }

    /// Evaluation points in order of appearance.
    #[must_use]
    pub fn evaluations(&self) -> &[EvalPoint] {
        &self.evaluations
    }

    /// Evaluation points keyed by step. A repeated step keeps its last value.
    #[must_use]
    pub fn evaluations_by_step(&self) -> BTreeMap<u64, EvalPoint> {
        self.evaluations.iter().map(|p| (p.step, *p)).collect()
    }

    /// Parameter count in millions, if reported.
    #[must_use]
    pub const fn num_parameters(&self) -> Option<f64> {
        self.num_parameters
    }

    /// Wall-clock duration in seconds, if reported.
    #[must_use]
    pub const fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Training loss of the last evaluation step.
    #[must_use]
    pub fn final_train_loss(&self) -> Option<f64> {
        self.evaluations.last().map(|p| p.train_loss)
    }

    /// Validation loss of the last evaluation step.
    #[must_use]
    pub fn final_val_loss(&self) -> Option<f64> {
        self.evaluations.last().map(|p| p.val_loss)
    }

    /// Whether nothing at all was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
            && self.evaluations.is_empty()
            && self.num_parameters.is_none()
            && self.duration.is_none()
    }
}

/// Builder for `MetricsRecord`.
///
/// Scalar fields keep the first value they are given; histories append.
#[derive(Debug, Default)]
pub struct MetricsRecordBuilder {
    record: MetricsRecord,
}

impl MetricsRecordBuilder {
    /// Append an iteration loss.
    pub fn push_iteration(&mut self, iter: u64, loss: f64) -> &mut Self {
        self.record.iterations.push(IterationLoss { iter, loss });
        self
    }

    /// Append an evaluation point.
    pub fn push_evaluation(&mut self, step: u64, train_loss: f64, val_loss: f64) -> &mut Self {
        self.record.evaluations.push(EvalPoint {
            step,
            train_loss,
            val_loss,
        });
        self
    }

    /// Set the parameter count unless one was already seen.
    pub fn num_parameters(&mut self, millions: f64) -> &mut Self {
        self.record.num_parameters.get_or_insert(millions);
        self
    }

    /// Set the duration unless one was already seen.
    pub fn duration(&mut self, seconds: f64) -> &mut Self {
        self.record.duration.get_or_insert(seconds);
        self
    }

    /// Build the `MetricsRecord`.
    #[must_use]
    pub fn build(self) -> MetricsRecord {
        self.record
    }
}
