//! Sweep configuration.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! The config file is `--config <path>` when given, otherwise `./nanosweep.toml`
//! if it exists. Environment variables are prefixed `NANOSWEEP_` and nested keys
//! are split on `__` (e.g. `NANOSWEEP_ANALYSIS__TOP_K=5`).
//!
//! The built-in defaults reproduce the four-member nanoGPT sweep.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{Error, Result};

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "nanosweep.toml";

/// A group preset fixes the two structural hyperparameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPreset {
    /// Group label, also the directory name under the experiments root
    pub name: String,
    /// Sequence length shared by every experiment in the group
    pub block_size: u32,
    /// Layer count shared by every experiment in the group
    pub n_layer: u32,
}

impl GroupPreset {
    /// Create a group preset.
    #[must_use]
    pub fn new(name: impl Into<String>, block_size: u32, n_layer: u32) -> Self {
        Self {
            name: name.into(),
            block_size,
            n_layer,
        }
    }
}

/// Ranges for the five hyperparameters varied within every group.
///
/// The Cartesian product is taken in field order, with `dropout`
/// varying fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    /// Attention head counts
    pub n_head: Vec<u32>,
    /// Embedding dimensions
    pub n_embd: Vec<u32>,
    /// Batch sizes
    pub batch_size: Vec<u32>,
    /// Training iteration budgets
    pub max_iters: Vec<u32>,
    /// Dropout rates
    pub dropout: Vec<f64>,
}

impl Default for ParamSpace {
    fn default() -> Self {
        Self {
            n_head: vec![4, 8],
            n_embd: vec![128, 256],
            batch_size: vec![8, 16],
            max_iters: vec![25, 50],
            dropout: vec![0.1, 0.2],
        }
    }
}

impl ParamSpace {
    /// Number of raw combinations before the divisibility filter.
    #[must_use]
    pub fn raw_combinations(&self) -> usize {
        self.n_head.len()
            * self.n_embd.len()
            * self.batch_size.len()
            * self.max_iters.len()
            * self.dropout.len()
    }
}

/// Filesystem layout of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Experiments root; groups live in `<root>/<group>/`
    pub root: PathBuf,
    /// Manifest file name inside the root
    pub manifest: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("experiments"),
            manifest: "experiment_summary.json".to_string(),
        }
    }
}

impl PathsConfig {
    /// Full path of the manifest artifact.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }

    /// Directory of one group.
    #[must_use]
    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    /// Directory holding a group's generated configs.
    #[must_use]
    pub fn configs_dir(&self, group: &str) -> PathBuf {
        self.group_dir(group).join("configs")
    }

    /// Directory holding a group's training logs.
    #[must_use]
    pub fn logs_dir(&self, group: &str) -> PathBuf {
        self.group_dir(group).join("logs")
    }

    /// Directory holding a group's trainer outputs.
    #[must_use]
    pub fn results_dir(&self, group: &str) -> PathBuf {
        self.group_dir(group).join("results")
    }
}

/// How the external training process is invoked.
///
/// The command line is `<program> <args...> <base_config> <generated_config>`,
/// run from `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Executable to spawn
    pub program: String,
    /// Arguments placed before the two config paths
    pub args: Vec<String>,
    /// Base training config, relative to `working_dir`
    pub base_config: PathBuf,
    /// Directory the trainer runs in
    pub working_dir: PathBuf,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["train.py".to_string()],
            base_config: PathBuf::from("config/train_shakespeare_char.py"),
            working_dir: PathBuf::from("nanoGPT"),
        }
    }
}

/// Output format of the summary tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Apache Parquet
    Parquet,
}

impl TableFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rows kept in the best-configurations table
    pub top_k: usize,
    /// Output format of both tables
    pub format: TableFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            format: TableFormat::Csv,
        }
    }
}

/// Top-level sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Group presets, in generation order
    pub groups: Vec<GroupPreset>,
    /// Ranges varied within every group
    pub space: ParamSpace,
    /// Training payload merged into every generated config
    pub base: Map<String, Value>,
    /// Filesystem layout
    pub paths: PathsConfig,
    /// External trainer invocation
    pub trainer: TrainerConfig,
    /// Aggregation settings
    pub analysis: AnalysisConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            groups: vec![
                GroupPreset::new("member1", 64, 4),
                GroupPreset::new("member2", 64, 6),
                GroupPreset::new("member3", 128, 4),
                GroupPreset::new("member4", 128, 6),
            ],
            space: ParamSpace::default(),
            base: default_base_payload(),
            paths: PathsConfig::default(),
            trainer: TrainerConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_base_payload() -> Map<String, Value> {
    let base = json!({
        "dataset": "shakespeare_char",
        "gradient_accumulation_steps": 1,
        "learning_rate": 1e-3,
        "decay_lr": true,
        "warmup_iters": 10,
        "min_lr": 1e-4,
        "eval_interval": 10,
        "eval_iters": 20,
        "log_interval": 1,
        "always_save_checkpoint": false,
        "device": "cpu",
        "compile": false,
    });
    match base {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl SweepConfig {
    /// Load layered configuration and validate it.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (prefixed with `NANOSWEEP_`)
    /// 2. Explicit config file, or `./nanosweep.toml` when present
    /// 3. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is missing, if extraction
    /// fails, or if the result does not validate.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::MissingArtifact {
                        path: path.to_path_buf(),
                        hint: "Pass an existing TOML file to --config".to_string(),
                    });
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    figment = figment.merge(Toml::file(local));
                }
            }
        }

        figment = figment.merge(Env::prefixed("NANOSWEEP_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable sweep.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for empty group lists, duplicate group names,
    /// empty ranges, zero head counts or `top_k == 0`.
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::InvalidConfig("at least one group is required".to_string()));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(Error::InvalidConfig("group names must not be empty".to_string()));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate group name: {}",
                    group.name
                )));
            }
        }

        let space = &self.space;
        for (field, empty) in [
            ("n_head", space.n_head.is_empty()),
            ("n_embd", space.n_embd.is_empty()),
            ("batch_size", space.batch_size.is_empty()),
            ("max_iters", space.max_iters.is_empty()),
            ("dropout", space.dropout.is_empty()),
        ] {
            if empty {
                return Err(Error::InvalidConfig(format!("range {field} is empty")));
            }
        }

        if space.n_head.contains(&0) {
            return Err(Error::InvalidConfig("n_head values must be positive".to_string()));
        }

        if space.dropout.iter().any(|d| !d.is_finite()) {
            return Err(Error::InvalidConfig("dropout values must be finite".to_string()));
        }

        if self.analysis.top_k == 0 {
            return Err(Error::InvalidConfig("analysis.top_k must be at least 1".to_string()));
        }

        Ok(())
    }
}
