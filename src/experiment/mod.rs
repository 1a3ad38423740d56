//! Experiment Schema
//!
//! Data structures shared by every stage of the sweep pipeline.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentConfig ──(name)── log artifact ──> MetricsRecord
//!        │                                          │
//!        └──────────── ExperimentResult <───────────┘
//!                            │
//!                      ResultStore (unique by name, last wins)
//! ```
//!
//! `ExperimentName` is the join key: it is rendered at synthesis time,
//! becomes the log file stem, and is decoded again by the aggregator.
//!
//! ## Usage
//!
//! ```rust
//! use nanosweep::experiment::{ExperimentName, Hyperparameters};
//!
//! let params = Hyperparameters {
//!     block_size: 64,
//!     n_layer: 4,
//!     n_head: 4,
//!     n_embd: 128,
//!     batch_size: 8,
//!     max_iters: 25,
//!     dropout: 0.1,
//! };
//! let name = ExperimentName::new(1, params);
//! assert_eq!(name.to_string(), "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1");
//!
//! let decoded = ExperimentName::parse(&name.to_string()).unwrap();
//! assert_eq!(decoded, name);
//! ```

mod config;
mod metrics;
mod name;
mod result;
mod run_record;
mod store;

pub use config::{ExperimentConfig, Hyperparameters};
pub use metrics::{EvalPoint, IterationLoss, MetricsRecord, MetricsRecordBuilder};
pub use name::ExperimentName;
pub use result::ExperimentResult;
pub use run_record::{RunRecord, RunStatus};
pub use store::ResultStore;
