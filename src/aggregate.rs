//! Aggregator
//!
//! Walks `<root>/<group>/logs/*.log` for every configured group, decodes
//! each file stem as an [`ExperimentName`], extracts its metrics and joins
//! the two into an [`ExperimentResult`]. Files whose stem does not decode
//! are skipped, and so are logs or directories that cannot be read: one
//! bad artifact never stops the analysis. The resulting [`ResultStore`]
//! backs the summary table, the statistics and every analysis output.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{PathsConfig, SweepConfig};
use crate::experiment::{EvalPoint, ExperimentName, ExperimentResult, IterationLoss, ResultStore};
use crate::extract::extract_metrics_from_file;
use crate::stats::SweepStatistics;
use crate::synth;
use crate::table::{write_batch, SummaryTable};
use crate::Result;

/// File name (without extension) of the full results table.
pub const ANALYSIS_RESULTS: &str = "analysis_results";
/// File name (without extension) of the best-configurations table.
pub const BEST_CONFIGURATIONS: &str = "best_configurations";
/// File name of the loss-curve export.
pub const LOSS_CURVES: &str = "loss_curves.json";

/// Log artifacts of one group, sorted by file name.
///
/// A missing logs directory yields no files. Directory entries that
/// cannot be read are skipped with a warning.
///
/// # Errors
///
/// Returns error if the directory exists but cannot be listed.
pub fn log_files(paths: &PathsConfig, group: &str) -> Result<Vec<PathBuf>> {
    let dir = paths.logs_dir(group);
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no logs directory");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(error) => {
                warn!(dir = %dir.display(), %error, "skipping unreadable directory entry");
                continue;
            }
        };
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Decode and extract one log artifact.
///
/// Returns `Ok(None)` when the file stem is not an experiment name.
///
/// # Errors
///
/// Returns error if the file cannot be read.
pub fn load_result(group: &str, path: &Path) -> Result<Option<ExperimentResult>> {
    let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
    if ExperimentName::parse(stem).is_none() {
        warn!(file = %path.display(), "skipping log with unrecognized name");
        return Ok(None);
    }

    let metrics = extract_metrics_from_file(path)?;
    debug!(
        file = %path.display(),
        evaluations = metrics.evaluations().len(),
        "extracted metrics"
    );
    Ok(ExperimentResult::from_stem(group, stem, metrics))
}

/// Collect results for every configured group, in group then file order.
///
/// A name seen twice keeps the last result at its first position. Logs
/// directories and log files that cannot be read are skipped with a
/// warning.
#[must_use]
pub fn collect_results(config: &SweepConfig) -> ResultStore {
    let mut store = ResultStore::new();
    for group in &config.groups {
        let files = match log_files(&config.paths, &group.name) {
            Ok(files) => files,
            Err(error) => {
                warn!(group = %group.name, %error, "skipping unreadable logs directory");
                continue;
            }
        };

        for path in files {
            match load_result(&group.name, &path) {
                Ok(Some(result)) => {
                    if let Some(previous) = store.insert(result) {
                        debug!(name = previous.exp_name(), "replaced earlier result");
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(file = %path.display(), %error, "skipping unreadable log");
                }
            }
        }
    }
    store
}

#[derive(Serialize)]
struct LossCurve<'a> {
    group: &'a str,
    exp_name: &'a str,
    iterations: &'a [IterationLoss],
    evaluations: &'a [EvalPoint],
}

/// Write per-experiment iteration and evaluation histories as JSON.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn write_loss_curves(store: &ResultStore, path: &Path) -> Result<()> {
    let curves: Vec<LossCurve<'_>> = store
        .iter()
        .map(|r| LossCurve {
            group: r.group(),
            exp_name: r.exp_name(),
            iterations: r.metrics().iterations(),
            evaluations: r.metrics().evaluations(),
        })
        .collect();
    fs::write(path, serde_json::to_string_pretty(&curves)?)?;
    Ok(())
}

/// Outcome of a completed analysis.
#[derive(Debug)]
pub struct AnalysisReport {
    table: SummaryTable,
    statistics: SweepStatistics,
    outputs: Vec<PathBuf>,
    top_k: usize,
}

impl AnalysisReport {
    /// Full summary table.
    #[must_use]
    pub const fn table(&self) -> &SummaryTable {
        &self.table
    }

    /// Sweep statistics.
    #[must_use]
    pub const fn statistics(&self) -> &SweepStatistics {
        &self.statistics
    }

    /// Files written, in write order.
    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Top rows by val loss for the sample print.
    #[must_use]
    pub fn sample(&self) -> Vec<&crate::table::SummaryRow> {
        self.table.best_by_val_loss(self.top_k)
    }
}

/// Run the full analysis: collect, tabulate, summarize and write outputs.
///
/// Returns `Ok(None)` and writes nothing when no results were found.
///
/// # Errors
///
/// Returns error if outputs cannot be written.
pub fn analyze(config: &SweepConfig) -> Result<Option<AnalysisReport>> {
    let store = collect_results(config);
    if store.is_empty() {
        info!("no results");
        return Ok(None);
    }

    let table = SummaryTable::from_store(&store);
    let expected = synth::plan(config).expected_counts();
    let statistics = SweepStatistics::compute(&table, &expected);

    let root = &config.paths.root;
    fs::create_dir_all(root)?;
    let format = config.analysis.format;
    let ext = format.extension();

    let results_path = root.join(format!("{ANALYSIS_RESULTS}.{ext}"));
    write_batch(&table.to_record_batch()?, &results_path, format)?;
    info!(path = %results_path.display(), rows = table.len(), "wrote results table");

    let best_path = root.join(format!("{BEST_CONFIGURATIONS}.{ext}"));
    let best = table.best_configurations(config.analysis.top_k)?;
    write_batch(&best, &best_path, format)?;
    info!(path = %best_path.display(), rows = best.num_rows(), "wrote best configurations");

    let curves_path = root.join(LOSS_CURVES);
    write_loss_curves(&store, &curves_path)?;
    info!(path = %curves_path.display(), "wrote loss curves");

    Ok(Some(AnalysisReport {
        table,
        statistics,
        outputs: vec![results_path, best_path, curves_path],
        top_k: config.analysis.top_k,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupPreset;

    const LOG: &str = "number of parameters: 0.80M\n\
                       iter 0: loss 4.2\n\
                       step 0: train loss 4.1, val loss 4.2\n\
                       step 20: train loss 2.1, val loss 2.4\n\
                       Duration: 5.50 seconds\n";

    fn config(root: &Path) -> SweepConfig {
        let mut config = SweepConfig::default();
        config.paths.root = root.to_path_buf();
        config.groups = vec![GroupPreset::new("member1", 64, 4), GroupPreset::new("member2", 64, 6)];
        config
    }

    fn write_log(config: &SweepConfig, group: &str, name: &str, text: &str) {
        let dir = config.paths.logs_dir(group);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.log")), text).unwrap();
    }

    #[test]
    fn test_missing_log_dirs_yield_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        assert!(collect_results(&config).is_empty());
        assert!(analyze(&config).unwrap().is_none());
        assert!(!dir.path().join("analysis_results.csv").exists());
        assert!(!dir.path().join(LOSS_CURVES).exists());
    }

    #[test]
    fn test_unparseable_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_log(&config, "member1", "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1", LOG);
        write_log(&config, "member1", "scratch", LOG);
        write_log(&config, "member1", "exp_x_bs64", LOG);

        let store = collect_results(&config);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_files_are_read_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_log(&config, "member2", "exp_002_bs64_nl6_nh4_ne128_bsz8_mi25_dr0.2", LOG);
        write_log(&config, "member2", "exp_001_bs64_nl6_nh4_ne128_bsz8_mi25_dr0.1", LOG);
        write_log(&config, "member1", "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1", LOG);

        let store = collect_results(&config);
        let names: Vec<&str> = store.iter().map(ExperimentResult::exp_name).collect();
        assert_eq!(
            names,
            vec![
                "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1",
                "exp_001_bs64_nl6_nh4_ne128_bsz8_mi25_dr0.1",
                "exp_002_bs64_nl6_nh4_ne128_bsz8_mi25_dr0.2",
            ]
        );
    }

    #[test]
    fn test_same_name_in_two_groups_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let name = "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1";
        write_log(&config, "member1", name, LOG);
        write_log(&config, "member2", name, "step 5: train loss 1.0, val loss 1.5\n");

        let store = collect_results(&config);
        assert_eq!(store.len(), 1);
        let result = store.get(name).unwrap();
        assert_eq!(result.group(), "member2");
        assert_eq!(result.metrics().final_val_loss(), Some(1.5));
    }

    #[test]
    fn test_analyze_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_log(&config, "member1", "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1", LOG);
        write_log(&config, "member1", "exp_002_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.2", "crashed\n");

        let report = analyze(&config).unwrap().unwrap();
        assert_eq!(report.table().len(), 2);
        assert_eq!(report.outputs().len(), 3);
        assert!(report.outputs().iter().all(|p| p.exists()));
        assert_eq!(report.statistics().expected, 64);
        assert_eq!(report.sample().len(), 1);

        let best = fs::read_to_string(dir.path().join("best_configurations.csv")).unwrap();
        assert!(best.starts_with("exp_name,group,block_size"));
        assert_eq!(best.lines().count(), 2);

        let curves: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(LOSS_CURVES)).unwrap())
                .unwrap();
        assert_eq!(curves.as_array().unwrap().len(), 2);
        assert_eq!(curves[0]["evaluations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_exp_name_keeps_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let stem = "exp_1_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.10";
        write_log(&config, "member1", stem, LOG);

        let report = analyze(&config).unwrap().unwrap();
        assert_eq!(report.table().rows()[0].exp_name, stem);
        assert!(config.paths.logs_dir("member1").join(format!("{stem}.log")).exists());

        let results = fs::read_to_string(dir.path().join("analysis_results.csv")).unwrap();
        assert!(results.contains(stem));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreadable_log_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_log(&config, "member1", "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1", LOG);
        // Reading offset 0 of a process's own memory map fails with EIO
        let broken = config
            .paths
            .logs_dir("member1")
            .join("exp_002_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.2.log");
        std::os::unix::fs::symlink("/proc/self/mem", &broken).unwrap();
        assert!(load_result("member1", &broken).is_err());

        let report = analyze(&config).unwrap().unwrap();
        assert_eq!(report.table().len(), 1);
        assert_eq!(
            report.table().rows()[0].exp_name,
            "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1"
        );
        assert!(dir.path().join("analysis_results.csv").exists());
    }
}
