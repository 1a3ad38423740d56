//! Job runner
//!
//! Runs manifest entries one at a time against the external trainer.
//! Each job blocks until the trainer exits; its merged stdout/stderr is
//! written verbatim into a log artifact between a header and a trailer.
//!
//! Failures stay local: a job that cannot be launched, whose log cannot be
//! written, or whose trainer exits non-zero is recorded as
//! [`RunStatus::Failed`](crate::experiment::RunStatus::Failed) and the batch
//! moves on. No retries, no timeout.
//!
//! ## Artifacts
//!
//! ```text
//! <root>/<group>/logs/<exp_name>.log     one per job
//! <root>/<group>/results_summary.json    checkpoint (single-group batch)
//! <root>/experiment_results.json         checkpoint (whole-sweep batch)
//! <dir>/final_results.json               batch summary, next to its checkpoint
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{PathsConfig, SweepConfig, TrainerConfig};
use crate::experiment::{RunRecord, RunStatus};
use crate::manifest::{Manifest, ManifestEntry};
use crate::Result;

const RULE: &str = "============================================================";

/// Captured result of one trainer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutput {
    /// Merged stdout/stderr text
    pub output: String,
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Whether the trainer exited successfully
    pub success: bool,
}

/// Something that can train one generated config and report its output.
pub trait Launcher {
    /// Run the trainer on `config_path` to completion.
    ///
    /// # Errors
    ///
    /// Returns error if the trainer cannot be started or its output
    /// cannot be collected.
    fn launch(&self, config_path: &Path) -> io::Result<LaunchOutput>;
}

/// Launches the trainer as a child process.
///
/// Invoked as `<program> <args...> <base_config> <absolute config path>`
/// from the configured working directory.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    trainer: TrainerConfig,
}

impl CommandLauncher {
    /// Create a launcher for the configured trainer.
    #[must_use]
    pub const fn new(trainer: TrainerConfig) -> Self {
        Self { trainer }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, config_path: &Path) -> io::Result<LaunchOutput> {
        // The trainer runs elsewhere, so relative paths would not resolve
        let config_path = std::path::absolute(config_path)?;

        let (mut reader, writer) = io::pipe()?;
        let mut command = Command::new(&self.trainer.program);
        command
            .args(&self.trainer.args)
            .arg(&self.trainer.base_config)
            .arg(&config_path)
            .current_dir(&self.trainer.working_dir)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let mut child = command.spawn()?;
        // The command holds write ends of the pipe; reading hits EOF only once they close
        drop(command);

        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let status = child.wait()?;

        Ok(LaunchOutput {
            output: String::from_utf8_lossy(&bytes).into_owned(),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

/// Which slice of the manifest a batch covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScope {
    /// Every entry of the manifest
    Sweep,
    /// Only the entries of one group
    Group(String),
}

impl BatchScope {
    fn dir(&self, paths: &PathsConfig) -> PathBuf {
        match self {
            Self::Sweep => paths.root.clone(),
            Self::Group(group) => paths.group_dir(group),
        }
    }

    /// Intermediate results artifact, rewritten after every job.
    #[must_use]
    pub fn checkpoint_path(&self, paths: &PathsConfig) -> PathBuf {
        let name = match self {
            Self::Sweep => "experiment_results.json",
            Self::Group(_) => "results_summary.json",
        };
        self.dir(paths).join(name)
    }

    /// Final batch summary artifact.
    #[must_use]
    pub fn final_path(&self, paths: &PathsConfig) -> PathBuf {
        self.dir(paths).join("final_results.json")
    }

    const fn group(&self) -> Option<&String> {
        match self {
            Self::Sweep => None,
            Self::Group(group) => Some(group),
        }
    }
}

/// Roll-up of one batch of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    total_experiments: usize,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_duration_seconds: f64,
    total_duration_minutes: f64,
    results: Vec<RunRecord>,
}

impl BatchSummary {
    /// Group the batch was restricted to, if any.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Number of jobs in the batch.
    #[must_use]
    pub const fn total_experiments(&self) -> usize {
        self.total_experiments
    }

    /// Wall-clock time of the whole batch in seconds.
    #[must_use]
    pub const fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    /// Per-job records in execution order.
    #[must_use]
    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }

    /// Number of successful jobs.
    #[must_use]
    pub fn successes(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status() == RunStatus::Success)
            .count()
    }

    /// Number of failed jobs.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.total_experiments - self.successes()
    }
}

/// Sequential job runner.
#[derive(Debug)]
pub struct JobRunner<L> {
    launcher: L,
    paths: PathsConfig,
}

impl<L: Launcher> JobRunner<L> {
    /// Create a runner writing logs under `paths.root`.
    #[must_use]
    pub const fn new(launcher: L, paths: PathsConfig) -> Self {
        Self { launcher, paths }
    }

    /// Log artifact path of a manifest entry.
    #[must_use]
    pub fn log_path(&self, entry: &ManifestEntry) -> PathBuf {
        self.paths
            .logs_dir(&entry.group)
            .join(format!("{}.log", entry.exp_name))
    }

    /// Run one job and return its status record. Never fails.
    pub fn run_job(&self, entry: &ManifestEntry) -> RunRecord {
        let log_path = self.log_path(entry);
        let mut record = RunRecord::new(
            &entry.group,
            &entry.exp_name,
            &entry.config_path,
            &log_path,
        );
        let started_at = record.start();
        let clock = Instant::now();

        match self.execute(entry, &log_path, started_at, clock) {
            Ok((launched, duration)) if launched.success => {
                info!(
                    exp = %entry.exp_name,
                    duration = %format!("{duration:.2}s"),
                    log = %log_path.display(),
                    "experiment completed"
                );
                record.succeed(duration);
            }
            Ok((launched, duration)) => {
                let detail = launched.exit_code.map_or_else(
                    || "trainer terminated by signal".to_string(),
                    |code| format!("trainer exited with status {code}"),
                );
                warn!(exp = %entry.exp_name, %detail, "experiment failed");
                record.fail(duration, detail);
            }
            Err(err) => {
                warn!(exp = %entry.exp_name, error = %err, "experiment failed");
                record.fail(clock.elapsed().as_secs_f64(), err.to_string());
            }
        }

        record
    }

    fn execute(
        &self,
        entry: &ManifestEntry,
        log_path: &Path,
        started_at: DateTime<Utc>,
        clock: Instant,
    ) -> io::Result<(LaunchOutput, f64)> {
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut log = BufWriter::new(File::create(log_path)?);

        writeln!(log, "Experiment: {}", entry.exp_name)?;
        writeln!(log, "Config: {}", entry.config_path.display())?;
        writeln!(log, "Started: {}", ctime(started_at))?;
        writeln!(log, "{RULE}\n")?;
        // Header stays on disk even if the launch fails
        log.flush()?;

        let launched = self.launcher.launch(&entry.config_path)?;
        log.write_all(launched.output.as_bytes())?;

        let duration = clock.elapsed().as_secs_f64();
        writeln!(log, "\n{RULE}")?;
        writeln!(log, "Completed: {}", ctime(Utc::now()))?;
        writeln!(log, "Duration: {duration:.2} seconds")?;
        log.flush()?;

        Ok((launched, duration))
    }

    /// Run entries in order, checkpointing after every job.
    ///
    /// # Errors
    ///
    /// Returns error only if a checkpoint or the final summary cannot be
    /// written. Job failures are recorded in the summary.
    pub fn run_batch(&self, entries: &[ManifestEntry], scope: &BatchScope) -> Result<BatchSummary> {
        let total = entries.len();
        let start_time = Utc::now();
        let clock = Instant::now();
        let checkpoint = scope.checkpoint_path(&self.paths);

        let mut results = Vec::with_capacity(total);
        for (idx, entry) in entries.iter().enumerate() {
            info!(progress = %format!("{}/{}", idx + 1, total), exp = %entry.exp_name, "running");
            results.push(self.run_job(entry));
            write_json(&checkpoint, &results)?;
        }

        let total_duration_seconds = clock.elapsed().as_secs_f64();
        let summary = BatchSummary {
            group: scope.group().cloned(),
            total_experiments: total,
            start_time,
            end_time: Utc::now(),
            total_duration_seconds,
            total_duration_minutes: total_duration_seconds / 60.0,
            results,
        };

        let final_path = scope.final_path(&self.paths);
        write_json(&final_path, &summary)?;
        info!(
            successes = summary.successes(),
            failures = summary.failures(),
            summary = %final_path.display(),
            "batch finished"
        );

        Ok(summary)
    }
}

/// Run the manifest described by `config`, optionally restricted to one group.
///
/// # Errors
///
/// Returns `MissingArtifact` when the manifest has not been generated,
/// `UnknownGroup` when `group` has no entries, or an IO error when a
/// checkpoint cannot be written.
pub fn run_manifest<L: Launcher>(
    config: &SweepConfig,
    launcher: L,
    group: Option<&str>,
) -> Result<BatchSummary> {
    let manifest = Manifest::load(config.paths.manifest_path())?;
    let (entries, scope) = match group {
        Some(group) => (
            manifest.entries_for_group(group)?,
            BatchScope::Group(group.to_string()),
        ),
        None => (manifest.experiments().to_vec(), BatchScope::Sweep),
    };

    info!(total = entries.len(), "starting batch");
    JobRunner::new(launcher, config.paths.clone()).run_batch(&entries, &scope)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn ctime(at: DateTime<Utc>) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}
