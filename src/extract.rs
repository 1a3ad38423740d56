//! Log extraction
//!
//! Training logs are unstructured text. Extraction treats them as a small
//! grammar of independent line patterns, applied to every physical line;
//! lines that match nothing are ignored.
//!
//! | Pattern                                          | Field                    |
//! |--------------------------------------------------|--------------------------|
//! | `number of parameters: <float>M`                 | `num_parameters` (first) |
//! | `iter <int>: loss <float>`                       | iteration history        |
//! | `step <int>: train loss <float>, val loss <float>` | evaluation history     |
//! | `Duration: <float> seconds`                      | `duration` (first)       |
//!
//! Extraction is pure and total: any input yields a [`MetricsRecord`],
//! possibly empty. A capture whose number does not parse is dropped.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::experiment::{MetricsRecord, MetricsRecordBuilder};
use crate::Result;

static PARAMETERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"number of parameters: ([\d.]+)M").expect("parameter pattern is a valid regex")
});

static ITERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"iter (\d+): loss ([\d.]+)").expect("iteration pattern is a valid regex")
});

static EVALUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"step (\d+): train loss ([\d.]+), val loss ([\d.]+)")
        .expect("evaluation pattern is a valid regex")
});

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: ([\d.]+) seconds").expect("duration pattern is a valid regex")
});

/// Incremental scanner that folds log lines into a [`MetricsRecord`].
#[derive(Debug, Default)]
pub struct LogScanner {
    builder: MetricsRecordBuilder,
}

impl LogScanner {
    /// Create a scanner with nothing observed yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every line pattern to one physical line.
    pub fn feed_line(&mut self, line: &str) {
        if let Some(millions) = PARAMETERS
            .captures(line)
            .and_then(|c| parse_float(c.get(1)?.as_str()))
        {
            self.builder.num_parameters(millions);
        }

        for caps in ITERATION.captures_iter(line) {
            if let (Some(iter), Some(loss)) = (parse_int(&caps[1]), parse_float(&caps[2])) {
                self.builder.push_iteration(iter, loss);
            }
        }

        for caps in EVALUATION.captures_iter(line) {
            if let (Some(step), Some(train), Some(val)) = (
                parse_int(&caps[1]),
                parse_float(&caps[2]),
                parse_float(&caps[3]),
            ) {
                self.builder.push_evaluation(step, train, val);
            }
        }

        if let Some(seconds) = DURATION
            .captures(line)
            .and_then(|c| parse_float(c.get(1)?.as_str()))
        {
            self.builder.duration(seconds);
        }
    }

    /// Finish scanning.
    #[must_use]
    pub fn finish(self) -> MetricsRecord {
        self.builder.build()
    }
}

fn parse_int(text: &str) -> Option<u64> {
    text.parse().ok()
}

// `[\d.]+` also admits strings like `1.2.3`; those are dropped here
fn parse_float(text: &str) -> Option<f64> {
    text.parse().ok()
}

/// Extract a metrics record from the full text of one log artifact.
///
/// # Examples
///
/// ```rust
/// use nanosweep::extract::extract_metrics;
///
/// let log = "number of parameters: 1.23M\n\
///            step 10: train loss 2.5, val loss 2.7\n\
///            step 20: train loss 2.1, val loss 2.4\n\
///            Duration: 5.50 seconds\n";
/// let metrics = extract_metrics(log);
/// assert_eq!(metrics.final_val_loss(), Some(2.4));
/// assert_eq!(metrics.num_parameters(), Some(1.23));
/// ```
#[must_use]
pub fn extract_metrics(text: &str) -> MetricsRecord {
    let mut scanner = LogScanner::new();
    for line in text.lines() {
        scanner.feed_line(line);
    }
    scanner.finish()
}

/// Read a log artifact and extract its metrics.
///
/// Invalid UTF-8 is replaced rather than rejected, so a partially
/// corrupted log still yields whatever lines are intact.
///
/// # Errors
///
/// Returns error only if the file cannot be read.
pub fn extract_metrics_from_file(path: impl AsRef<Path>) -> Result<MetricsRecord> {
    let bytes = fs::read(path)?;
    Ok(extract_metrics(&String::from_utf8_lossy(&bytes)))
}
