//! Manifest - structured list of every generated experiment
//!
//! Written by the synthesizer before any job runs; read by the job runner.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::experiment::ExperimentConfig;
use crate::{Error, Result};

/// One generated experiment, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Group label
    pub group: String,
    /// Experiment name (join key)
    pub exp_name: String,
    /// Generated config artifact
    pub config_path: PathBuf,
    /// Full config payload
    pub config: Map<String, Value>,
}

impl From<&ExperimentConfig> for ManifestEntry {
    fn from(experiment: &ExperimentConfig) -> Self {
        Self {
            group: experiment.group().to_string(),
            exp_name: experiment.name().to_string(),
            config_path: experiment.config_path().to_path_buf(),
            config: experiment.payload().clone(),
        }
    }
}

/// Number of experiments generated for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    /// Group label
    pub group: String,
    /// Experiments generated for the group
    pub count: usize,
}

/// Manifest of a generated sweep.
///
/// Entries are in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    total_experiments: usize,
    experiments_per_group: usize,
    groups: Vec<GroupCount>,
    experiments: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from entries, counting per group in first-seen order.
    #[must_use]
    pub fn new(experiments: Vec<ManifestEntry>) -> Self {
        let mut groups: Vec<GroupCount> = Vec::new();
        for entry in &experiments {
            match groups.iter_mut().find(|g| g.group == entry.group) {
                Some(count) => count.count += 1,
                None => groups.push(GroupCount {
                    group: entry.group.clone(),
                    count: 1,
                }),
            }
        }

        let experiments_per_group = if groups.is_empty() {
            0
        } else {
            experiments.len() / groups.len()
        };

        Self {
            total_experiments: experiments.len(),
            experiments_per_group,
            groups,
            experiments,
        }
    }

    /// Load a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns `MissingArtifact` when the file does not exist, or a JSON/IO
    /// error when it cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingArtifact {
                path: path.to_path_buf(),
                hint: "Run `nanosweep generate` to create the manifest first".to_string(),
            });
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the manifest as pretty JSON, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory or file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Total number of experiments.
    #[must_use]
    pub const fn total_experiments(&self) -> usize {
        self.total_experiments
    }

    /// Total divided evenly across groups.
    #[must_use]
    pub const fn experiments_per_group(&self) -> usize {
        self.experiments_per_group
    }

    /// Per-group counts in generation order.
    #[must_use]
    pub fn groups(&self) -> &[GroupCount] {
        &self.groups
    }

    /// All entries in generation order.
    #[must_use]
    pub fn experiments(&self) -> &[ManifestEntry] {
        &self.experiments
    }

    /// Entries of one group, in generation order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownGroup` when the manifest has no entry for `group`.
    pub fn entries_for_group(&self, group: &str) -> Result<Vec<ManifestEntry>> {
        let entries: Vec<_> = self
            .experiments
            .iter()
            .filter(|e| e.group == group)
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(Error::UnknownGroup(group.to_string()));
        }
        Ok(entries)
    }
}
