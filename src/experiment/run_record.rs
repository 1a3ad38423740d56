//! Run Record - status of one training job invocation

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Run is currently executing.
    Running,
    /// Trainer exited cleanly and the log was written.
    Success,
    /// Invocation, log writing or the trainer itself failed.
    Failed,
}

/// Run Record represents a single execution of one manifest entry.
///
/// Serialized as-is into the checkpoint and final summary artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    group: String,
    exp_name: String,
    config_path: PathBuf,
    log_file: PathBuf,
    status: RunStatus,
    duration: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `group` - Group the experiment belongs to
    /// * `exp_name` - Experiment name (join key)
    /// * `config_path` - Generated config artifact passed to the trainer
    /// * `log_file` - Where the captured output is written
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        exp_name: impl Into<String>,
        config_path: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group: group.into(),
            exp_name: exp_name.into(),
            config_path: config_path.into(),
            log_file: log_file.into(),
            status: RunStatus::Pending,
            duration: None,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    /// Get the group label.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Get the experiment name.
    #[must_use]
    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    /// Get the config artifact path.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the log artifact path.
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the measured wall-clock duration in seconds, once finished.
    #[must_use]
    pub const fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get the failure detail, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// Sets the `started_at` timestamp to now and returns it.
    pub fn start(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.status = RunStatus::Running;
        self.started_at = Some(now);
        now
    }

    /// Finish the run successfully.
    pub fn succeed(&mut self, duration: f64) {
        self.finish(RunStatus::Success, duration);
    }

    /// Finish the run as failed with the given detail.
    pub fn fail(&mut self, duration: f64, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(RunStatus::Failed, duration);
    }

    fn finish(&mut self, status: RunStatus, duration: f64) {
        self.status = status;
        self.duration = Some(duration);
        self.ended_at = Some(Utc::now());
    }
}
