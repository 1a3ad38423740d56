//! # nanosweep: Hyperparameter Sweep Coordinator
//!
//! **Version**: 0.1.0
//!
//! nanosweep drives a grid sweep over a nanoGPT-style training script and
//! turns the resulting plain-text logs into ranked, tabular summaries.
//!
//! ## Pipeline
//!
//! ```text
//! synth ──> configs + manifest ──> runner ──> logs ──> extract ─┐
//!                                                               ├─> aggregate ──> table / stats
//!                                 experiment::ExperimentName ───┘
//! ```
//!
//! - [`synth`]: Cartesian product per group, invalid head/embedding pairs skipped
//! - [`runner`]: sequential external jobs, merged output captured to one log each
//! - [`extract`]: line-pattern scraping into a [`experiment::MetricsRecord`]
//! - [`aggregate`]: join names with metrics, write Arrow tables (CSV or Parquet)
//! - [`stats`]: completion, spreads, best run and hyperparameter impact
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a failed job or unreadable log is recorded, never fatal to the batch
//! - **Poka-Yoke**: incompatible head/embedding pairs never reach the trainer
//! - **Genchi Genbutsu**: metrics come from what the trainer actually printed
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nanosweep::config::SweepConfig;
//! use nanosweep::{aggregate, synth};
//!
//! let config = SweepConfig::load(None)?;
//! let plan = synth::plan(&config);
//! plan.write(&config.paths)?;
//!
//! // ... run `nanosweep run`, then:
//! if let Some(report) = aggregate::analyze(&config)? {
//!     println!("{}", report.statistics());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod experiment;
pub mod extract;
pub mod manifest;
pub mod runner;
pub mod stats;
pub mod synth;
pub mod table;
pub mod topk;

pub use error::{Error, Result};
