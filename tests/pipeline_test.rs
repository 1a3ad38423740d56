//! End-to-end pipeline tests: generate -> run -> analyze
//!
//! The trainer is replaced by a scripted launcher that prints
//! nanoGPT-style output derived from the config file name.

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nanosweep::aggregate;
use nanosweep::config::{GroupPreset, SweepConfig, TableFormat};
use nanosweep::experiment::{ExperimentName, RunStatus};
use nanosweep::manifest::Manifest;
use nanosweep::runner::{run_manifest, BatchScope, JobRunner, LaunchOutput, Launcher};
use nanosweep::synth::{self, CONFIG_HEADER};
use nanosweep::table::read_parquet;
use nanosweep::Error;

/// Scripted trainer: val loss falls with embedding size, runs with
/// `max_iters == 50` and `batch_size == 16` exit non-zero after training.
struct FakeTrainer;

impl Launcher for FakeTrainer {
    fn launch(&self, config_path: &Path) -> io::Result<LaunchOutput> {
        let text = fs::read_to_string(config_path)?;
        assert!(text.starts_with(CONFIG_HEADER));

        let stem = config_path.file_stem().unwrap().to_str().unwrap();
        let p = *ExperimentName::parse(stem).unwrap().hyperparameters();
        let val = 3.0 - f64::from(p.n_embd) / 256.0 + p.dropout;
        let train = val - 0.05 * f64::from(p.n_layer);

        let mut output = format!(
            "number of parameters: {:.2}M\nstep 0: train loss 4.2000, val loss 4.2100\n",
            f64::from(p.n_embd * p.n_layer) / 1000.0
        );
        for iter in 0..3 {
            output.push_str(&format!("iter {iter}: loss {:.4}, time 40.00ms\n", 4.0 - f64::from(iter) * 0.1));
        }
        output.push_str(&format!(
            "step {}: train loss {train:.4}, val loss {val:.4}\n",
            p.max_iters
        ));

        let failed = p.max_iters == 50 && p.batch_size == 16;
        Ok(LaunchOutput {
            output,
            exit_code: Some(i32::from(failed)),
            success: !failed,
        })
    }
}

/// Launcher whose loss improves on every call, for re-run scenarios
struct ImprovingTrainer {
    calls: Cell<u32>,
}

impl Launcher for ImprovingTrainer {
    fn launch(&self, _config_path: &Path) -> io::Result<LaunchOutput> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        Ok(LaunchOutput {
            output: format!("step 10: train loss 2.0, val loss {:.1}\n", 3.0 - f64::from(n)),
            exit_code: Some(0),
            success: true,
        })
    }
}

fn two_group_config(root: &Path) -> SweepConfig {
    let mut config = SweepConfig::default();
    config.paths.root = root.to_path_buf();
    config.groups = vec![GroupPreset::new("member1", 64, 4), GroupPreset::new("member2", 64, 6)];
    config.space.n_head = vec![5, 4];
    config.space.n_embd = vec![128, 256];
    config
}

#[test]
fn test_synthesis_scenario_two_groups() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());

    let plan = synth::plan(&config);
    assert_eq!(plan.len(), 32);
    assert_eq!(plan.skipped(), 32);
    assert_eq!(plan.count_for("member1"), 16);
    assert_eq!(plan.count_for("member2"), 16);

    let member1: Vec<_> = plan
        .experiments()
        .iter()
        .filter(|e| e.group() == "member1")
        .collect();
    assert_eq!(
        member1[0].name().to_string(),
        "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1"
    );
    assert_eq!(
        member1[15].name().to_string(),
        "exp_016_bs64_nl4_nh4_ne256_bsz16_mi50_dr0.2"
    );
    assert_eq!(
        member1[0].config_path(),
        dir.path()
            .join("member1/configs/exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1.py")
    );
    assert_eq!(
        member1[0].out_dir(),
        dir.path()
            .join("member1/results/exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1")
    );
}

#[test]
fn test_generate_writes_configs_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());

    let manifest = synth::plan(&config).write(&config.paths).unwrap();
    assert_eq!(manifest.total_experiments(), 32);
    assert_eq!(manifest.experiments_per_group(), 16);

    let loaded = Manifest::load(config.paths.manifest_path()).unwrap();
    assert_eq!(loaded, manifest);

    let first = &loaded.experiments()[0];
    let artifact = fs::read_to_string(&first.config_path).unwrap();
    assert!(artifact.starts_with("# Experiment configuration\n"));
    assert!(artifact.contains("n_head = 4\n"));
    assert!(artifact.contains("dropout = 0.1\n"));
    assert!(artifact.contains("lr_decay_iters = 25\n"));
    assert!(artifact.contains("dataset = \"shakespeare_char\"\n"));
    assert!(artifact.contains("decay_lr = True\n"));
    assert!(artifact.contains("compile = False\n"));
}

#[test]
fn test_generate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());

    synth::plan(&config).write(&config.paths).unwrap();
    let manifest_path = config.paths.manifest_path();
    let first = fs::read(&manifest_path).unwrap();
    let artifact_path = Manifest::load(&manifest_path).unwrap().experiments()[7]
        .config_path
        .clone();
    let first_artifact = fs::read(&artifact_path).unwrap();

    synth::plan(&config).write(&config.paths).unwrap();
    assert_eq!(fs::read(&manifest_path).unwrap(), first);
    assert_eq!(fs::read(&artifact_path).unwrap(), first_artifact);
}

#[test]
fn test_run_requires_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());

    let err = run_manifest(&config, FakeTrainer, None).unwrap_err();
    assert!(matches!(err, Error::MissingArtifact { .. }));
}

#[test]
fn test_run_unknown_group() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());
    synth::plan(&config).write(&config.paths).unwrap();

    let err = run_manifest(&config, FakeTrainer, Some("member9")).unwrap_err();
    assert!(matches!(err, Error::UnknownGroup(_)));
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());
    synth::plan(&config).write(&config.paths).unwrap();

    let summary = run_manifest(&config, FakeTrainer, None).unwrap();
    assert_eq!(summary.total_experiments(), 32);
    // batch_size 16 x max_iters 50 x 2 dropouts x 2 embd, per group
    assert_eq!(summary.failures(), 8);
    assert_eq!(summary.successes(), 24);
    assert!(dir.path().join("experiment_results.json").exists());
    assert!(dir.path().join("final_results.json").exists());

    let failed = summary
        .results()
        .iter()
        .find(|r| r.status() == RunStatus::Failed)
        .unwrap();
    assert_eq!(failed.error(), Some("trainer exited with status 1"));
    let failed_log = fs::read_to_string(failed.log_file()).unwrap();
    assert!(failed_log.contains("step 50: train loss"));
    assert!(failed_log.contains("Duration: "));

    let report = aggregate::analyze(&config).unwrap().unwrap();
    let stats = report.statistics();
    assert_eq!(stats.completed, 32);
    assert_eq!(stats.expected, 32);
    assert_eq!(stats.progress(), Some(100.0));
    assert!(stats.duration.is_some());

    // Largest embedding and lowest dropout win; ties keep the first row
    let best = stats.best.as_ref().unwrap();
    assert_eq!(best.params.n_embd, 256);
    assert_eq!(best.params.dropout, 0.1);
    assert_eq!(best.group, "member1");
    assert_eq!(best.exp_name, "exp_009_bs64_nl4_nh4_ne256_bsz8_mi25_dr0.1");

    let results = fs::read_to_string(dir.path().join("analysis_results.csv")).unwrap();
    assert_eq!(results.lines().count(), 33);
    let best_csv = fs::read_to_string(dir.path().join("best_configurations.csv")).unwrap();
    assert_eq!(best_csv.lines().count(), 11);
    assert!(dir.path().join("loss_curves.json").exists());

    let sample = report.sample();
    assert_eq!(sample.len(), 10);
    assert!(sample
        .windows(2)
        .all(|w| w[0].final_val_loss <= w[1].final_val_loss));
}

#[test]
fn test_group_run_writes_group_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());
    synth::plan(&config).write(&config.paths).unwrap();

    let summary = run_manifest(&config, FakeTrainer, Some("member2")).unwrap();
    assert_eq!(summary.total_experiments(), 16);
    assert_eq!(summary.group(), Some("member2"));
    assert!(dir.path().join("member2/results_summary.json").exists());
    assert!(dir.path().join("member2/final_results.json").exists());
    assert!(!dir.path().join("experiment_results.json").exists());

    let report = aggregate::analyze(&config).unwrap().unwrap();
    let member1 = &report.statistics().groups[0];
    assert_eq!(member1.completed, 0);
    assert_eq!(member1.expected, 16);
    assert!(member1.mean_val_loss.is_none());
}

#[test]
fn test_duplicate_entries_last_wins() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());
    let manifest = synth::plan(&config).write(&config.paths).unwrap();

    let entry = manifest.experiments()[0].clone();
    let entries = vec![entry.clone(), entry.clone()];
    let runner = JobRunner::new(
        ImprovingTrainer {
            calls: Cell::new(0),
        },
        config.paths.clone(),
    );
    let summary = runner
        .run_batch(&entries, &BatchScope::Group(entry.group.clone()))
        .unwrap();

    // Status list keeps both runs
    assert_eq!(summary.results().len(), 2);

    let report = aggregate::analyze(&config).unwrap().unwrap();
    assert_eq!(report.table().len(), 1);
    assert_eq!(report.table().rows()[0].final_val_loss, Some(1.0));
}

#[test]
fn test_parquet_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = two_group_config(dir.path());
    config.analysis.format = TableFormat::Parquet;
    config.analysis.top_k = 3;
    synth::plan(&config).write(&config.paths).unwrap();
    run_manifest(&config, FakeTrainer, None).unwrap();

    let report = aggregate::analyze(&config).unwrap().unwrap();
    let outputs: Vec<PathBuf> = report.outputs().to_vec();
    assert!(outputs[0].ends_with("analysis_results.parquet"));
    assert!(outputs[1].ends_with("best_configurations.parquet"));

    let rows = |path: &Path| -> usize {
        read_parquet(path)
            .unwrap()
            .iter()
            .map(arrow::record_batch::RecordBatch::num_rows)
            .sum()
    };
    assert_eq!(rows(&outputs[0]), 32);
    assert_eq!(rows(&outputs[1]), 3);
}

#[test]
fn test_analyze_without_logs_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_group_config(dir.path());
    synth::plan(&config).write(&config.paths).unwrap();

    assert!(aggregate::analyze(&config).unwrap().is_none());
    assert!(!dir.path().join("analysis_results.csv").exists());
    assert!(!dir.path().join("best_configurations.csv").exists());
}
