//! Sweep walkthrough
//!
//! Runs the whole pipeline in a scratch directory with a stand-in trainer:
//! generate configs, run every job, then analyze the logs.
//!
//! Run with: cargo run --example sweep_walkthrough

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use nanosweep::aggregate;
use nanosweep::config::SweepConfig;
use nanosweep::experiment::ExperimentName;
use nanosweep::runner::{run_manifest, LaunchOutput, Launcher};
use nanosweep::synth;

/// Prints a plausible training transcript instead of training
struct StandInTrainer;

impl Launcher for StandInTrainer {
    fn launch(&self, config_path: &Path) -> io::Result<LaunchOutput> {
        let name = config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(ExperimentName::parse)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a sweep config"))?;
        let p = name.hyperparameters();

        let params = f64::from(p.n_layer * 12 * p.n_embd * p.n_embd) / 1e6;
        let val = 2.2 + 40.0 / f64::from(p.n_embd) + p.dropout - f64::from(p.max_iters) / 100.0;
        let train = val - 0.02 * f64::from(p.n_layer);

        let mut output = format!("number of parameters: {params:.2}M\n");
        output.push_str("step 0: train loss 4.2000, val loss 4.2100\n");
        for iter in 0..p.max_iters {
            output.push_str(&format!("iter {iter}: loss {:.4}\n", 4.2 - f64::from(iter) * 0.02));
        }
        output.push_str(&format!(
            "step {}: train loss {train:.4}, val loss {val:.4}\n",
            p.max_iters
        ));

        Ok(LaunchOutput {
            output,
            exit_code: Some(0),
            success: true,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = env::temp_dir().join("nanosweep-walkthrough");
    if root.exists() {
        fs::remove_dir_all(&root)?;
    }

    let mut config = SweepConfig::default();
    config.paths.root = root.clone();
    config.analysis.top_k = 5;

    println!("=== Generate ===");
    let plan = synth::plan(&config);
    let manifest = plan.write(&config.paths)?;
    println!(
        "{} experiments across {} groups ({} skipped)",
        manifest.total_experiments(),
        manifest.groups().len(),
        plan.skipped()
    );

    println!("\n=== Run ===");
    let summary = run_manifest(&config, StandInTrainer, None)?;
    println!(
        "{} succeeded, {} failed",
        summary.successes(),
        summary.failures()
    );

    println!("\n=== Analyze ===");
    if let Some(report) = aggregate::analyze(&config)? {
        println!("{}", report.statistics());
        for row in report.sample() {
            println!(
                "{:<10} {:<48} {:.4}",
                row.group,
                row.exp_name,
                row.final_val_loss.unwrap_or(f64::NAN)
            );
        }
    }

    println!("\nArtifacts in {}", root.display());
    Ok(())
}
