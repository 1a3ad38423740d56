//! nanosweep command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nanosweep::aggregate::{self, AnalysisReport};
use nanosweep::config::SweepConfig;
use nanosweep::runner::{self, CommandLauncher};
use nanosweep::synth;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const HASH_RULE: &str = "################################################################################";
const LIGHT_RULE: &str = "--------------------------------------------------------------------------------";

#[derive(Parser, Debug)]
#[command(name = "nanosweep", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./nanosweep.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Write one config file per sweep point plus the manifest
    Generate,
    /// Run training jobs listed in the manifest
    Run {
        /// Only run this group's experiments
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Scrape logs and write summary tables
    Analyze,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let config = SweepConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate => generate(&config),
        Commands::Run { group } => run(&config, group.as_deref()),
        Commands::Analyze => analyze(&config),
    }
}

fn generate(config: &SweepConfig) -> anyhow::Result<()> {
    let plan = synth::plan(config);
    let manifest = plan
        .write(&config.paths)
        .context("Failed to write experiment configs")?;

    println!("Generated {} experiments", manifest.total_experiments());
    for group in manifest.groups() {
        println!("  {}: {} experiments", group.group, group.count);
    }
    if plan.skipped() > 0 {
        println!("Skipped {} incompatible combinations", plan.skipped());
    }
    println!("Manifest: {}", config.paths.manifest_path().display());
    Ok(())
}

fn run(config: &SweepConfig, group: Option<&str>) -> anyhow::Result<()> {
    let launcher = CommandLauncher::new(config.trainer.clone());
    let summary = runner::run_manifest(config, launcher, group)?;

    println!("\n{LIGHT_RULE}");
    println!(
        "Completed {} experiments in {:.2} minutes",
        summary.total_experiments(),
        summary.total_duration_seconds() / 60.0
    );
    println!("Successful: {}", summary.successes());
    println!("Failed: {}", summary.failures());
    println!("{LIGHT_RULE}");
    Ok(())
}

fn analyze(config: &SweepConfig) -> anyhow::Result<()> {
    println!("\n{HASH_RULE}");
    println!("# nanoGPT EXPERIMENT RESULTS ANALYSIS");
    println!("{HASH_RULE}");

    match aggregate::analyze(config).context("Failed to analyze experiment logs")? {
        Some(report) => print_report(&report),
        None => println!("\nNo results found. Run `nanosweep run` and wait for experiments to finish."),
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{}", report.statistics());

    for path in report.outputs() {
        println!("Saved: {}", path.display());
    }

    let sample = report.sample();
    println!("\n{LIGHT_RULE}");
    println!("SAMPLE RESULTS (Top {} by validation loss):", sample.len());
    println!("{LIGHT_RULE}");
    println!(
        "{:<10} {:<48} {:>10} {:>8} {:>10}",
        "group", "exp_name", "val_loss", "gap", "duration"
    );
    let cell = |value: Option<f64>, precision: usize| {
        value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
    };
    for row in sample {
        println!(
            "{:<10} {:<48} {:>10} {:>8} {:>10}",
            row.group,
            row.exp_name,
            cell(row.final_val_loss, 4),
            cell(row.val_train_gap, 4),
            cell(row.duration, 2),
        );
    }

    println!("\n{HASH_RULE}");
    println!("# ANALYSIS COMPLETE");
    println!("{HASH_RULE}\n");
}
