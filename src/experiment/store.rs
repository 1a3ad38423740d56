//! Result Store - in-memory collection of experiment results
//!
//! Results are unique by experiment name as found on disk (the log file
//! stem). Inserting a name that is
//! already present replaces the earlier result in place (last wins,
//! first position kept), matching overwrite semantics when the same
//! experiment is processed twice.

use std::collections::HashMap;

use super::ExperimentResult;

/// In-memory store for experiment results.
///
/// ## Design
///
/// A vector keeps insertion order for table output; a hash map from
/// name to slot gives O(1) duplicate detection.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Vec<ExperimentResult>,
    slots: HashMap<String, usize>,
}

impl ResultStore {
    /// Create a new empty result store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get the number of distinct experiments in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Insert a result, returning the one it replaced, if any.
    pub fn insert(&mut self, result: ExperimentResult) -> Option<ExperimentResult> {
        let key = result.exp_name().to_string();
        if let Some(&slot) = self.slots.get(&key) {
            return Some(std::mem::replace(&mut self.results[slot], result));
        }
        self.slots.insert(key, self.results.len());
        self.results.push(result);
        None
    }

    /// Get a result by experiment name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExperimentResult> {
        self.slots.get(name).map(|&slot| &self.results[slot])
    }

    /// Iterate results in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExperimentResult> {
        self.results.iter()
    }
}

impl Extend<ExperimentResult> for ResultStore {
    fn extend<I: IntoIterator<Item = ExperimentResult>>(&mut self, iter: I) {
        for result in iter {
            self.insert(result);
        }
    }
}

impl FromIterator<ExperimentResult> for ResultStore {
    fn from_iter<I: IntoIterator<Item = ExperimentResult>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentName, MetricsRecord};

    fn result(group: &str, name: &str, val: f64) -> ExperimentResult {
        let mut builder = MetricsRecord::builder();
        builder.push_evaluation(10, val - 0.1, val);
        ExperimentResult::new(group, ExperimentName::parse(name).unwrap(), builder.build())
    }

    const A: &str = "exp_001_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.1";
    const B: &str = "exp_002_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.2";

    #[test]
    fn test_store_default() {
        let store = ResultStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = ResultStore::new();
        assert!(store.insert(result("member1", A, 2.0)).is_none());
        assert!(store.insert(result("member1", B, 1.5)).is_none());

        assert_eq!(store.len(), 2);
        assert!(store.get(A).is_some());
        assert!(store.get("exp_999").is_none());
    }

    #[test]
    fn test_duplicate_name_last_wins_first_position() {
        let mut store = ResultStore::new();
        store.insert(result("member1", A, 2.0));
        store.insert(result("member1", B, 1.5));
        let replaced = store.insert(result("member2", A, 1.0));

        assert_eq!(replaced.unwrap().metrics().final_val_loss(), Some(2.0));
        assert_eq!(store.len(), 2);

        let order: Vec<_> = store.iter().map(|r| r.exp_name().to_string()).collect();
        assert_eq!(order, vec![A.to_string(), B.to_string()]);
        assert_eq!(store.get(A).unwrap().metrics().final_val_loss(), Some(1.0));
        assert_eq!(store.get(A).unwrap().group(), "member2");
    }

    #[test]
    fn test_distinct_stems_with_same_fields_stay_separate() {
        let padded = "exp_1_bs64_nl4_nh4_ne128_bsz8_mi25_dr0.10";
        let store: ResultStore = vec![
            result("member1", A, 2.0),
            ExperimentResult::from_stem("member1", padded, MetricsRecord::new()).unwrap(),
        ]
        .into_iter()
        .collect();

        assert_eq!(store.len(), 2);
        assert!(store.get(A).is_some());
        assert!(store.get(padded).is_some());
    }
}
