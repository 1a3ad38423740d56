//! Top-K selection algorithms
//!
//! **Problem**: `ORDER BY ... LIMIT K` is O(N log N). Top-K selection is O(N log K).
//!
//! **Solution**: Heap-based Top-K selection with stable tie-breaking
//!
//! Selection keeps the K smallest values. Rows are ranked by value first
//! and by original row index second, so rows with equal values come out
//! in their input order. Null and NaN values never qualify; when fewer
//! than K rows qualify, fewer are returned.
//!
//! Toyota Way Principles:
//! - **Kaizen**: Algorithmic improvement (O(N log N) → O(N log K))
//! - **Muda elimination**: Avoid unnecessary full sort

use crate::Error;
use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Trait for Top-K selection on record batches
pub trait TopKSelection {
    /// Select the K rows with the smallest values in a column
    ///
    /// # Arguments
    /// * `column_index` - Index of the column to rank by
    /// * `k` - Number of rows to select
    ///
    /// # Returns
    /// A new `RecordBatch` with at most K rows, best first
    ///
    /// # Errors
    /// Returns error if:
    /// - Column index is out of bounds
    /// - Column data type is not sortable
    /// - K is zero
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nanosweep::topk::TopKSelection;
    /// use arrow::array::{Float64Array, RecordBatch};
    /// use arrow::datatypes::{DataType, Field, Schema};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let schema = Arc::new(Schema::new(vec![
    ///     Field::new("val_loss", DataType::Float64, true),
    /// ]));
    /// let batch = RecordBatch::try_new(
    ///     schema,
    ///     vec![Arc::new(Float64Array::from(vec![Some(2.1), None, Some(1.9), Some(2.4)]))],
    /// )?;
    ///
    /// // Best 5 (lowest) losses: only 3 rows qualify
    /// let best = batch.top_k(0, 5)?;
    /// assert_eq!(best.num_rows(), 3);
    /// # Ok(())
    /// # }
    /// ```
    fn top_k(&self, column_index: usize, k: usize) -> crate::Result<RecordBatch>;
}

impl TopKSelection for RecordBatch {
    fn top_k(&self, column_index: usize, k: usize) -> crate::Result<RecordBatch> {
        // Validate inputs
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".to_string()));
        }

        if column_index >= self.num_columns() {
            return Err(Error::InvalidInput(format!(
                "Column index {} out of bounds (batch has {} columns)",
                column_index,
                self.num_columns()
            )));
        }

        let indices = select_top_k_indices(self.column(column_index), k)?;
        build_batch_from_indices(self, &indices)
    }
}

/// Select the row indices of the K smallest values of a column, best first.
///
/// # Errors
/// Returns error if the column type is not `Float64`.
pub fn select_top_k_indices(column: &ArrayRef, k: usize) -> crate::Result<Vec<usize>> {
    match column.data_type() {
        DataType::Float64 => {
            let array = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::StorageError("Failed to downcast Float64 column".to_string())
                })?;
            let values = (0..array.len())
                .filter(|&i| array.is_valid(i) && !array.value(i).is_nan())
                .map(|i| (i, array.value(i)));
            Ok(select(values, k))
        }
        dt => Err(Error::InvalidInput(format!(
            "Top-K not supported for data type: {dt:?}"
        ))),
    }
}

/// Indices of the K smallest `Option<f64>` values, skipping `None` and NaN.
#[must_use]
pub fn top_k_values(values: &[Option<f64>], k: usize) -> Vec<usize> {
    let present = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|v| !v.is_nan()).map(|v| (i, v)));
    select(present, k)
}

// Ranked so that `Less` means "better"; the heap top is the worst kept row
struct HeapItem {
    value: f64,
    index: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time complexity: O(N log K) where N = number of rows, K = selection size
/// Space complexity: O(K) for the heap
fn select(values: impl Iterator<Item = (usize, f64)>, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::with_capacity(k);
    for (index, value) in values {
        let item = HeapItem { value, index };
        if heap.len() < k {
            heap.push(item);
        } else if let Some(top) = heap.peek() {
            if item < *top {
                heap.pop();
                heap.push(item);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|item| item.index)
        .collect()
}

/// Build a new record batch from selected row indices
fn build_batch_from_indices(batch: &RecordBatch, indices: &[usize]) -> crate::Result<RecordBatch> {
    let indices = indices
        .iter()
        .map(|&i| {
            u32::try_from(i).map_err(|_| Error::InvalidInput(format!("Row index {i} exceeds u32")))
        })
        .collect::<crate::Result<Vec<u32>>>()?;

    take_record_batch(batch, &UInt32Array::from(indices))
        .map_err(|e| Error::StorageError(format!("Failed to create result batch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch(names: Vec<&str>, losses: Vec<Option<f64>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("exp_name", DataType::Utf8, false),
            Field::new("final_val_loss", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(names)),
                Arc::new(Float64Array::from(losses)),
            ],
        )
        .unwrap()
    }

    fn names(batch: &RecordBatch) -> Vec<String> {
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        (0..col.len()).map(|i| col.value(i).to_string()).collect()
    }

    #[test]
    fn test_top_k_smallest() {
        let b = batch(
            vec!["a", "b", "c", "d"],
            vec![Some(2.0), Some(1.0), Some(3.0), Some(1.5)],
        );
        let result = b.top_k(1, 2).unwrap();
        assert_eq!(names(&result), vec!["b", "d"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let b = batch(
            vec!["a", "b", "c", "d", "e"],
            vec![Some(1.0), Some(0.5), Some(1.0), Some(1.0), Some(0.5)],
        );
        let result = b.top_k(1, 4).unwrap();
        assert_eq!(names(&result), vec!["b", "e", "a", "c"]);

        let result = b.top_k(1, 3).unwrap();
        assert_eq!(names(&result), vec!["b", "e", "a"]);
    }

    #[test]
    fn test_nulls_and_nan_excluded() {
        let b = batch(
            vec!["a", "b", "c", "d"],
            vec![None, Some(f64::NAN), Some(3.0), Some(1.0)],
        );
        let result = b.top_k(1, 10).unwrap();
        assert_eq!(names(&result), vec!["d", "c"]);
    }

    #[test]
    fn test_k_larger_than_rows() {
        let b = batch(vec!["a"], vec![Some(1.0)]);
        assert_eq!(b.top_k(1, 10).unwrap().num_rows(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        let b = batch(vec!["a"], vec![Some(1.0)]);
        assert!(matches!(
            b.top_k(1, 0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            b.top_k(5, 1),
            Err(Error::InvalidInput(_))
        ));
        // Utf8 is not a sortable column here
        assert!(matches!(
            b.top_k(0, 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_select_indices_on_column() {
        let array: ArrayRef = Arc::new(Float64Array::from(vec![5.0, 1.0, 4.0, 1.0]));
        let indices = select_top_k_indices(&array, 3).unwrap();
        assert_eq!(indices, vec![1, 3, 2]);
    }

    #[test]
    fn test_top_k_values() {
        let values = vec![Some(2.0), None, Some(1.0), Some(2.0)];
        assert_eq!(top_k_values(&values, 10), vec![2, 0, 3]);
        assert!(top_k_values(&values, 0).is_empty());
    }
}
