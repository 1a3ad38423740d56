//! Error types for nanosweep
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Only pipeline-level failures live here. A failed training job, an
//! unparseable log name or a missing log pattern are recorded as values,
//! never raised.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// nanosweep error types
#[derive(Error, Debug)]
pub enum Error {
    /// Layered configuration could not be extracted
    #[error("Configuration error: {0}\nCheck nanosweep.toml and NANOSWEEP_* environment variables")]
    Config(String),

    /// Configuration parsed but describes an unusable sweep
    #[error("Invalid sweep configuration: {0}")]
    InvalidConfig(String),

    /// A required upstream artifact is absent (fatal)
    #[error("Required artifact not found: {}\n{hint}", path.display())]
    MissingArtifact {
        /// Path that was expected to exist
        path: PathBuf,
        /// How to produce the artifact
        hint: String,
    },

    /// Requested group is not part of the sweep
    #[error("Unknown group: {0}\nGroups are defined in the [[groups]] section of the config")]
    UnknownGroup(String),

    /// Invalid argument to a table operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Table construction or output failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (manifest, run records) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
