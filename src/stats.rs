//! Sweep statistics
//!
//! Aggregates over a [`SummaryTable`]: completion against the expected
//! sweep size, per-group comparison, duration and parameter spreads, the
//! best run and a per-hyperparameter impact breakdown. Unset metrics are
//! left out of every aggregate rather than counted as zero.

use std::fmt;

use serde::Serialize;

use crate::experiment::Hyperparameters;
use crate::table::{SummaryRow, SummaryTable};

const HEAVY_RULE: &str = "================================================================================";
const LIGHT_RULE: &str = "--------------------------------------------------------------------------------";

type Accessor = fn(&Hyperparameters) -> f64;

/// The seven swept hyperparameters, in name order.
const PARAMETERS: [(&str, Accessor); 7] = [
    ("block_size", |p: &Hyperparameters| f64::from(p.block_size)),
    ("n_layer", |p: &Hyperparameters| f64::from(p.n_layer)),
    ("n_head", |p: &Hyperparameters| f64::from(p.n_head)),
    ("n_embd", |p: &Hyperparameters| f64::from(p.n_embd)),
    ("batch_size", |p: &Hyperparameters| f64::from(p.batch_size)),
    ("max_iters", |p: &Hyperparameters| f64::from(p.max_iters)),
    ("dropout", |p: &Hyperparameters| p.dropout),
];

/// Min, max, mean and sum of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    /// Number of values
    pub count: usize,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Sum
    pub sum: f64,
}

impl Spread {
    /// Spread of `values`, or `None` when there are none.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut spread = Self {
            count: 1,
            min: first,
            max: first,
            mean: first,
            sum: first,
        };
        for value in iter {
            spread.count += 1;
            spread.min = spread.min.min(value);
            spread.max = spread.max.max(value);
            spread.sum += value;
        }
        spread.mean = spread.sum / spread.count as f64;
        Some(spread)
    }
}

/// One group's completion and headline metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComparison {
    /// Group label
    pub group: String,
    /// Rows found for the group
    pub completed: usize,
    /// Experiments the sweep defines for the group
    pub expected: usize,
    /// Mean final val loss over rows that report one
    pub mean_val_loss: Option<f64>,
    /// Mean duration over rows that report one
    pub mean_duration: Option<f64>,
}

/// Aggregates for the rows sharing one hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactLevel {
    /// Hyperparameter value
    pub value: f64,
    /// Rows with this value
    pub count: usize,
    /// Final val loss spread (rows without a val loss excluded)
    pub val_loss: Option<Spread>,
    /// Mean generalization gap
    pub mean_gap: Option<f64>,
}

/// Impact breakdown for one hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterImpact {
    /// Hyperparameter name
    pub parameter: &'static str,
    /// One entry per distinct value, ascending
    pub levels: Vec<ImpactLevel>,
}

/// Summary statistics for one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepStatistics {
    /// Rows in the summary table
    pub completed: usize,
    /// Experiments the sweep defines
    pub expected: usize,
    /// Per-group comparison, in sweep group order
    pub groups: Vec<GroupComparison>,
    /// Duration spread in seconds
    pub duration: Option<Spread>,
    /// Parameter count spread in millions
    pub num_parameters: Option<Spread>,
    /// Row with the smallest final val loss (first on ties)
    pub best: Option<SummaryRow>,
    /// Per-hyperparameter impact breakdown
    pub impact: Vec<ParameterImpact>,
}

impl SweepStatistics {
    /// Compute statistics for `table` against per-group expected counts.
    ///
    /// Groups present in the table but not in `expected` are appended
    /// with an expected count of zero.
    #[must_use]
    pub fn compute(table: &SummaryTable, expected: &[(String, usize)]) -> Self {
        let rows = table.rows();

        let mut group_names: Vec<&str> = expected.iter().map(|(g, _)| g.as_str()).collect();
        for row in rows {
            if !group_names.contains(&row.group.as_str()) {
                group_names.push(&row.group);
            }
        }

        let groups = group_names
            .into_iter()
            .map(|group| {
                let members: Vec<&SummaryRow> = rows.iter().filter(|r| r.group == group).collect();
                GroupComparison {
                    group: group.to_string(),
                    completed: members.len(),
                    expected: expected
                        .iter()
                        .find(|(g, _)| g == group)
                        .map_or(0, |(_, n)| *n),
                    mean_val_loss: Spread::of(members.iter().filter_map(|r| r.final_val_loss))
                        .map(|s| s.mean),
                    mean_duration: Spread::of(members.iter().filter_map(|r| r.duration))
                        .map(|s| s.mean),
                }
            })
            .collect();

        Self {
            completed: rows.len(),
            expected: expected.iter().map(|(_, n)| n).sum(),
            groups,
            duration: Spread::of(rows.iter().filter_map(|r| r.duration)),
            num_parameters: Spread::of(rows.iter().filter_map(|r| r.num_parameters)),
            best: table.best_by_val_loss(1).first().map(|&row| row.clone()),
            impact: PARAMETERS
                .iter()
                .map(|&(parameter, get)| impact_of(rows, parameter, get))
                .collect(),
        }
    }

    /// Completion percentage, if anything is expected.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> Option<f64> {
        (self.expected > 0).then(|| self.completed as f64 / self.expected as f64 * 100.0)
    }
}

fn impact_of(rows: &[SummaryRow], parameter: &'static str, get: Accessor) -> ParameterImpact {
    let mut values: Vec<f64> = rows.iter().map(|r| get(&r.params)).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();

    let levels = values
        .into_iter()
        .map(|value| {
            let members: Vec<&SummaryRow> = rows
                .iter()
                .filter(|r| get(&r.params).total_cmp(&value).is_eq())
                .collect();
            ImpactLevel {
                value,
                count: members.len(),
                val_loss: Spread::of(members.iter().filter_map(|r| r.final_val_loss)),
                mean_gap: Spread::of(members.iter().filter_map(|r| r.val_train_gap))
                    .map(|s| s.mean),
            }
        })
        .collect();

    ParameterImpact { parameter, levels }
}

fn or_na(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "\n{LIGHT_RULE}")?;
    writeln!(f, "{title}:")?;
    writeln!(f, "{LIGHT_RULE}")
}

impl fmt::Display for SweepStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{HEAVY_RULE}")?;
        writeln!(f, "EXPERIMENT SUMMARY STATISTICS")?;
        writeln!(f, "{HEAVY_RULE}")?;
        writeln!(f, "\nTotal experiments completed: {}", self.completed)?;
        writeln!(f, "Total experiments expected: {}", self.expected)?;
        if let Some(progress) = self.progress() {
            writeln!(f, "Progress: {progress:.1}%")?;
        }

        section(f, "BY GROUP")?;
        for g in &self.groups {
            writeln!(
                f,
                "{}: {}/{} experiments (mean val loss {}, mean duration {}s)",
                g.group,
                g.completed,
                g.expected,
                or_na(g.mean_val_loss, 4),
                or_na(g.mean_duration, 2),
            )?;
        }

        section(f, "LOSS STATISTICS")?;
        match &self.best {
            Some(best) => {
                let p = &best.params;
                writeln!(f, "Best validation loss: {}", or_na(best.final_val_loss, 4))?;
                writeln!(f, "  Experiment: {} ({})", best.exp_name, best.group)?;
                writeln!(
                    f,
                    "  Config: bs={}, nl={}, nh={}, ne={}, bsz={}, mi={}, dr={:?}",
                    p.block_size, p.n_layer, p.n_head, p.n_embd, p.batch_size, p.max_iters, p.dropout
                )?;
            }
            None => writeln!(f, "No run reported a validation loss")?,
        }

        section(f, "DURATION STATISTICS")?;
        match &self.duration {
            Some(d) => {
                writeln!(f, "Shortest duration: {:.2} seconds", d.min)?;
                writeln!(f, "Average duration: {:.2} seconds", d.mean)?;
                writeln!(
                    f,
                    "Total time so far: {:.2} seconds ({:.2} minutes)",
                    d.sum,
                    d.sum / 60.0
                )?;
            }
            None => writeln!(f, "No run reported a duration")?,
        }

        section(f, "PARAMETER STATISTICS")?;
        match &self.num_parameters {
            Some(p) => writeln!(f, "Parameter range: {:.2}M - {:.2}M", p.min, p.max)?,
            None => writeln!(f, "No run reported a parameter count")?,
        }

        section(f, "HYPERPARAMETER IMPACT")?;
        for impact in &self.impact {
            writeln!(f, "{}:", impact.parameter)?;
            for level in &impact.levels {
                let loss = level.val_loss;
                writeln!(
                    f,
                    "  {:>8} n={:<4} val loss mean {} min {} max {}  gap {}",
                    level.value,
                    level.count,
                    or_na(loss.map(|s| s.mean), 4),
                    or_na(loss.map(|s| s.min), 4),
                    or_na(loss.map(|s| s.max), 4),
                    or_na(level.mean_gap, 4),
                )?;
            }
        }

        write!(f, "\n{HEAVY_RULE}")
    }
}
