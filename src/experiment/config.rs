//! Experiment Config - one point of the sweep

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ExperimentName;

/// The seven hyperparameters that identify a sweep point.
///
/// `block_size` and `n_layer` are fixed per group; the other five come
/// from the Cartesian product of the configured ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Context length (sequence length)
    pub block_size: u32,
    /// Number of transformer layers
    pub n_layer: u32,
    /// Number of attention heads
    pub n_head: u32,
    /// Embedding dimension
    pub n_embd: u32,
    /// Batch size
    pub batch_size: u32,
    /// Training iterations
    pub max_iters: u32,
    /// Dropout rate
    pub dropout: f64,
}

impl Hyperparameters {
    /// Whether the embedding dimension splits evenly across the heads.
    #[must_use]
    pub const fn heads_divide_embedding(&self) -> bool {
        self.n_head != 0 && self.n_embd % self.n_head == 0
    }
}

/// Experiment Config represents one generated sweep point.
///
/// Immutable once generated. The payload is the full key/value set
/// written to the config artifact (base training config plus the
/// hyperparameters of this point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    group: String,
    name: ExperimentName,
    config_path: PathBuf,
    out_dir: PathBuf,
    payload: serde_json::Map<String, serde_json::Value>,
}

impl ExperimentConfig {
    /// Create a new experiment config.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        name: ExperimentName,
        config_path: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            group: group.into(),
            name,
            config_path: config_path.into(),
            out_dir: out_dir.into(),
            payload,
        }
    }

    /// Get the group label.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the experiment name (join key).
    #[must_use]
    pub const fn name(&self) -> &ExperimentName {
        &self.name
    }

    /// Get the hyperparameters of this sweep point.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        self.name.hyperparameters()
    }

    /// Get the path of the generated config artifact.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the trainer output directory for this experiment.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Get the full config payload.
    #[must_use]
    pub const fn payload(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.payload
    }
}
