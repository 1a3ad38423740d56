//! Config synthesis
//!
//! Enumerates the Cartesian product of the configured ranges for every
//! group preset, drops combinations whose embedding dimension does not
//! split evenly across the heads, and turns each survivor into an
//! [`ExperimentConfig`].
//!
//! Synthesis itself is pure: [`synthesize`] returns an immutable
//! [`SweepPlan`]. Writing config artifacts and the manifest is a separate
//! step ([`SweepPlan::write`]) so that the plan can also be used to
//! compute expected counts without touching the filesystem.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{GroupPreset, ParamSpace, PathsConfig, SweepConfig};
use crate::experiment::{ExperimentConfig, ExperimentName, Hyperparameters};
use crate::manifest::{Manifest, ManifestEntry};
use crate::Result;

/// Header line of every generated config artifact.
pub const CONFIG_HEADER: &str = "# Experiment configuration";

/// The full set of valid experiments of a sweep, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    groups: Vec<String>,
    experiments: Vec<ExperimentConfig>,
    skipped: usize,
}

impl SweepPlan {
    /// All experiments, grouped and in generation order.
    #[must_use]
    pub fn experiments(&self) -> &[ExperimentConfig] {
        &self.experiments
    }

    /// Number of experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Whether no combination survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Number of combinations dropped by the divisibility filter.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Group labels in configured order.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Number of experiments generated for `group`.
    #[must_use]
    pub fn count_for(&self, group: &str) -> usize {
        self.experiments.iter().filter(|e| e.group() == group).count()
    }

    /// `(group, expected experiment count)` pairs in configured order.
    #[must_use]
    pub fn expected_counts(&self) -> Vec<(String, usize)> {
        self.groups
            .iter()
            .map(|g| (g.clone(), self.count_for(g)))
            .collect()
    }

    /// Write one config artifact per experiment and the manifest.
    ///
    /// Every file is overwritten, so re-running with identical inputs
    /// produces identical artifacts.
    ///
    /// # Errors
    ///
    /// Returns error if a directory or file cannot be written.
    pub fn write(&self, paths: &PathsConfig) -> Result<Manifest> {
        for group in &self.groups {
            fs::create_dir_all(paths.configs_dir(group))?;
        }

        for experiment in &self.experiments {
            fs::write(
                experiment.config_path(),
                render_config_artifact(experiment.payload()),
            )?;
            debug!(path = %experiment.config_path().display(), "wrote config");
        }

        let manifest = Manifest::new(self.experiments.iter().map(ManifestEntry::from).collect());
        let manifest_path = paths.manifest_path();
        manifest.save(&manifest_path)?;

        info!(
            total = manifest.total_experiments(),
            manifest = %manifest_path.display(),
            "sweep generated"
        );
        Ok(manifest)
    }
}

/// Enumerate every valid sweep point.
///
/// For each group the product is taken over `n_head × n_embd × batch_size
/// × max_iters × dropout` (dropout varying fastest). Tuples where
/// `n_embd % n_head != 0` are skipped with a notice. Survivors get a
/// 1-based index that is sequential within their group.
#[must_use]
pub fn synthesize(
    groups: &[GroupPreset],
    space: &ParamSpace,
    base: &Map<String, Value>,
    paths: &PathsConfig,
) -> SweepPlan {
    let mut experiments = Vec::new();
    let mut skipped = 0;

    for group in groups {
        let mut index = 0u32;
        for &n_head in &space.n_head {
            for &n_embd in &space.n_embd {
                for &batch_size in &space.batch_size {
                    for &max_iters in &space.max_iters {
                        for &dropout in &space.dropout {
                            let params = Hyperparameters {
                                block_size: group.block_size,
                                n_layer: group.n_layer,
                                n_head,
                                n_embd,
                                batch_size,
                                max_iters,
                                dropout,
                            };

                            if !params.heads_divide_embedding() {
                                info!(
                                    group = %group.name,
                                    n_embd,
                                    n_head,
                                    "skipping incompatible combination"
                                );
                                skipped += 1;
                                continue;
                            }

                            index += 1;
                            experiments.push(build_experiment(
                                &group.name,
                                ExperimentName::new(index, params),
                                base,
                                paths,
                            ));
                        }
                    }
                }
            }
        }
        debug!(group = %group.name, generated = index, "group synthesized");
    }

    SweepPlan {
        groups: groups.iter().map(|g| g.name.clone()).collect(),
        experiments,
        skipped,
    }
}

/// Synthesize the sweep described by a full configuration.
#[must_use]
pub fn plan(config: &SweepConfig) -> SweepPlan {
    synthesize(&config.groups, &config.space, &config.base, &config.paths)
}

fn build_experiment(
    group: &str,
    name: ExperimentName,
    base: &Map<String, Value>,
    paths: &PathsConfig,
) -> ExperimentConfig {
    let p = *name.hyperparameters();
    let stem = name.to_string();
    let out_dir = paths.results_dir(group).join(&stem);
    let config_path = paths.configs_dir(group).join(format!("{stem}.py"));

    let mut payload = base.clone();
    payload.insert("block_size".into(), p.block_size.into());
    payload.insert("n_layer".into(), p.n_layer.into());
    payload.insert("n_head".into(), p.n_head.into());
    payload.insert("n_embd".into(), p.n_embd.into());
    payload.insert("batch_size".into(), p.batch_size.into());
    payload.insert("max_iters".into(), p.max_iters.into());
    payload.insert("dropout".into(), p.dropout.into());
    payload.insert("lr_decay_iters".into(), p.max_iters.into());
    payload.insert("out_dir".into(), Value::String(path_string(&out_dir)));

    ExperimentConfig::new(group, name, config_path, out_dir, payload)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Render a payload as a nanoGPT-style Python assignment file.
///
/// Strings are double-quoted, booleans become `True`/`False`, null becomes
/// `None`, and numbers are written verbatim.
#[must_use]
pub fn render_config_artifact(payload: &Map<String, Value>) -> String {
    let mut out = String::from(CONFIG_HEADER);
    out.push('\n');
    for (key, value) in payload {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(&python_literal(value));
        out.push('\n');
    }
    out
}

fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        // JSON string and number syntax are valid Python literals
        other => other.to_string(),
    }
}
