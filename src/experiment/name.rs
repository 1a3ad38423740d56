//! Experiment Name - canonical string encoding of a sweep point
//!
//! Template: `exp_<idx:03>_bs<block_size>_nl<n_layer>_nh<n_head>_ne<n_embd>_bsz<batch_size>_mi<max_iters>_dr<dropout>`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Hyperparameters;
use crate::Error;

// Anchored at both ends: no partial-match recovery
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^exp_(\d+)_bs(\d+)_nl(\d+)_nh(\d+)_ne(\d+)_bsz(\d+)_mi(\d+)_dr([0-9.eE+-]+)$",
    )
    .expect("experiment name pattern is a valid regex")
});

/// Experiment Name is the join key between config, log file and record.
///
/// Rendering then parsing yields the original index and hyperparameters.
/// Dropout uses the shortest representation that round-trips (`0.1`,
/// `0.2`, `1.0`), so the decoded float is bit-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentName {
    index: u32,
    params: Hyperparameters,
}

impl ExperimentName {
    /// Create a name from a 1-based sequence index and the hyperparameters.
    #[must_use]
    pub const fn new(index: u32, params: Hyperparameters) -> Self {
        Self { index, params }
    }

    /// Decode a name string.
    ///
    /// Returns `None` when the string does not match the template exactly
    /// or a numeric field does not fit its type. Callers skip such files.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let caps = NAME_PATTERN.captures(name)?;
        let int = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

        let dropout = caps.get(8)?.as_str().parse::<f64>().ok()?;
        if !dropout.is_finite() {
            return None;
        }

        Some(Self {
            index: int(1)?,
            params: Hyperparameters {
                block_size: int(2)?,
                n_layer: int(3)?,
                n_head: int(4)?,
                n_embd: int(5)?,
                batch_size: int(6)?,
                max_iters: int(7)?,
                dropout,
            },
        })
    }

    /// Get the 1-based sequence index within the group.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Get the encoded hyperparameters.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        // `{:?}` on f64 keeps the trailing `.0` and round-trips exactly
        write!(
            f,
            "exp_{:03}_bs{}_nl{}_nh{}_ne{}_bsz{}_mi{}_dr{:?}",
            self.index, p.block_size, p.n_layer, p.n_head, p.n_embd, p.batch_size, p.max_iters,
            p.dropout
        )
    }
}

impl TryFrom<String> for ExperimentName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| Error::InvalidInput(format!("Malformed experiment name: {value}")))
    }
}

impl From<ExperimentName> for String {
    fn from(name: ExperimentName) -> Self {
        name.to_string()
    }
}
