//! Summary table (Arrow)
//!
//! One row per experiment result with the derived generalization gap.
//! The table converts into an Arrow `RecordBatch` for ranking and for
//! output as CSV or Parquet. Unset metrics are Arrow nulls.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::config::TableFormat;
use crate::experiment::{ExperimentResult, Hyperparameters, ResultStore};
use crate::topk::{top_k_values, TopKSelection};
use crate::{Error, Result};

/// Column sorted on for best-configuration reporting.
pub const VAL_LOSS_COLUMN: &str = "final_val_loss";

/// Columns of the best-configurations table, in output order.
pub const BEST_COLUMNS: [&str; 11] = [
    "exp_name",
    "group",
    "block_size",
    "n_layer",
    "n_head",
    "n_embd",
    "batch_size",
    "max_iters",
    "dropout",
    "final_val_loss",
    "val_train_gap",
];

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// Group label
    pub group: String,
    /// Experiment name
    pub exp_name: String,
    /// Sequence index within the group
    pub exp_num: u32,
    /// Decoded hyperparameters
    #[serde(flatten)]
    pub params: Hyperparameters,
    /// Parameter count in millions
    pub num_parameters: Option<f64>,
    /// Last evaluation train loss
    pub final_train_loss: Option<f64>,
    /// Last evaluation val loss
    pub final_val_loss: Option<f64>,
    /// Wall-clock duration in seconds
    pub duration: Option<f64>,
    /// `final_val_loss - final_train_loss`
    pub val_train_gap: Option<f64>,
}

impl From<&ExperimentResult> for SummaryRow {
    fn from(result: &ExperimentResult) -> Self {
        let metrics = result.metrics();
        Self {
            group: result.group().to_string(),
            exp_name: result.exp_name().to_string(),
            exp_num: result.name().index(),
            params: *result.hyperparameters(),
            num_parameters: metrics.num_parameters(),
            final_train_loss: metrics.final_train_loss(),
            final_val_loss: metrics.final_val_loss(),
            duration: metrics.duration(),
            val_train_gap: result.gap(),
        }
    }
}

/// Row-per-result tabular view of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Build a table from rows.
    #[must_use]
    pub const fn new(rows: Vec<SummaryRow>) -> Self {
        Self { rows }
    }

    /// Build a table from every result in a store, in store order.
    #[must_use]
    pub fn from_store(store: &ResultStore) -> Self {
        Self::new(store.iter().map(SummaryRow::from).collect())
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `k` rows with the smallest final val loss, best first.
    ///
    /// Rows without a val loss never qualify. Ties keep table order.
    #[must_use]
    pub fn best_by_val_loss(&self, k: usize) -> Vec<&SummaryRow> {
        let losses: Vec<Option<f64>> = self.rows.iter().map(|r| r.final_val_loss).collect();
        top_k_values(&losses, k)
            .into_iter()
            .map(|i| &self.rows[i])
            .collect()
    }

    /// Arrow schema of the full table.
    #[must_use]
    pub fn schema() -> SchemaRef {
        let uint = |name: &str| Field::new(name, DataType::UInt32, false);
        let metric = |name: &str| Field::new(name, DataType::Float64, true);
        Arc::new(Schema::new(vec![
            Field::new("group", DataType::Utf8, false),
            Field::new("exp_name", DataType::Utf8, false),
            uint("exp_num"),
            uint("block_size"),
            uint("n_layer"),
            uint("n_head"),
            uint("n_embd"),
            uint("batch_size"),
            uint("max_iters"),
            Field::new("dropout", DataType::Float64, false),
            metric("num_parameters"),
            metric("final_train_loss"),
            metric(VAL_LOSS_COLUMN),
            metric("duration"),
            metric("val_train_gap"),
        ]))
    }

    /// Convert the table into a single Arrow record batch.
    ///
    /// # Errors
    ///
    /// Returns error if Arrow rejects the columns (should not happen for
    /// the fixed schema).
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let text = |f: fn(&SummaryRow) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
        };
        let uint = |f: fn(&SummaryRow) -> u32| -> ArrayRef {
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(f)))
        };
        let metric = |f: fn(&SummaryRow) -> Option<f64>| -> ArrayRef {
            Arc::new(rows.iter().map(f).collect::<Float64Array>())
        };

        let columns = vec![
            text(|r| r.group.as_str()),
            text(|r| r.exp_name.as_str()),
            uint(|r| r.exp_num),
            uint(|r| r.params.block_size),
            uint(|r| r.params.n_layer),
            uint(|r| r.params.n_head),
            uint(|r| r.params.n_embd),
            uint(|r| r.params.batch_size),
            uint(|r| r.params.max_iters),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|r| r.params.dropout),
            )) as ArrayRef,
            metric(|r| r.num_parameters),
            metric(|r| r.final_train_loss),
            metric(|r| r.final_val_loss),
            metric(|r| r.duration),
            metric(|r| r.val_train_gap),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    /// Best-configurations batch: top `k` by val loss, projected onto
    /// [`BEST_COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns error if `k == 0` or the batch cannot be built.
    pub fn best_configurations(&self, k: usize) -> Result<RecordBatch> {
        let batch = self.to_record_batch()?;
        let schema = batch.schema();
        let sort_column = schema.index_of(VAL_LOSS_COLUMN)?;
        let best = batch.top_k(sort_column, k)?;

        let projection = BEST_COLUMNS
            .iter()
            .map(|name| schema.index_of(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(best.project(&projection)?)
    }
}

/// Write one record batch to `path` in the given format, overwriting.
///
/// # Errors
///
/// Returns error if the file cannot be created or encoded.
pub fn write_batch(batch: &RecordBatch, path: &Path, format: TableFormat) -> Result<()> {
    let file = File::create(path)?;
    match format {
        TableFormat::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(file);
            writer.write(batch)?;
        }
        TableFormat::Parquet => {
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(batch)?;
            writer.close()?;
        }
    }
    Ok(())
}

/// Read back a Parquet table (used to verify outputs).
///
/// # Errors
///
/// Returns error if the file cannot be opened or decoded.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    reader
        .map(|batch| batch.map_err(Error::from))
        .collect()
}
