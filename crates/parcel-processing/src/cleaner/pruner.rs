//! Missingness and cardinality column pruning.

use crate::error::Result;
use crate::utils::feature_columns;
use polars::prelude::*;
use tracing::{debug, warn};

/// Drops sparse columns, then near-unique columns.
///
/// The cardinality rule is evaluated on the table left by the missingness
/// rule, so a column dropped for sparsity never counts towards either list
/// twice.
#[derive(Debug, Clone)]
pub struct ColumnPruner {
    /// Columns with a lower non-missing fraction are dropped.
    pub min_present_fraction: f64,
    /// Columns with more distinct non-missing values are dropped.
    pub max_distinct: usize,
    /// Columns the cardinality rule never drops.
    pub exempt: Vec<String>,
}

/// Columns removed by one pruning pass, per rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutcome {
    pub sparse: Vec<String>,
    pub high_cardinality: Vec<String>,
}

impl PruneOutcome {
    pub fn total(&self) -> usize {
        self.sparse.len() + self.high_cardinality.len()
    }
}

impl ColumnPruner {
    pub fn new(min_present_fraction: f64, max_distinct: usize, exempt: Vec<String>) -> Self {
        Self {
            min_present_fraction,
            max_distinct,
            exempt,
        }
    }

    /// Apply both rules; surviving columns keep their input order.
    pub fn prune(&self, df: DataFrame) -> Result<(DataFrame, PruneOutcome)> {
        let mut outcome = PruneOutcome::default();
        let height = df.height();

        for name in feature_columns(&df) {
            let series = df.column(&name)?.as_materialized_series();
            let present = height - series.null_count();
            let fraction = if height == 0 {
                1.0
            } else {
                present as f64 / height as f64
            };
            if fraction < self.min_present_fraction {
                debug!(
                    "Column '{}' is {:.1}% present, below threshold",
                    name,
                    fraction * 100.0
                );
                outcome.sparse.push(name);
            }
        }
        let df = df.drop_many(outcome.sparse.iter().map(|s| PlSmallStr::from(s.as_str())));

        for name in &self.exempt {
            if df.get_column_index(name).is_none() {
                warn!(
                    "Cardinality exemption '{}' is not in the table, ignoring",
                    name
                );
            }
        }

        for name in feature_columns(&df) {
            if self.exempt.contains(&name) {
                continue;
            }
            let distinct = df
                .column(&name)?
                .as_materialized_series()
                .drop_nulls()
                .n_unique()?;
            if distinct > self.max_distinct {
                debug!("Column '{}' has {} distinct values", name, distinct);
                outcome.high_cardinality.push(name);
            }
        }
        let df = df.drop_many(
            outcome
                .high_cardinality
                .iter()
                .map(|s| PlSmallStr::from(s.as_str())),
        );

        Ok((df, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ROW_INDEX;
    use pretty_assertions::assert_eq;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_drops_sparse_columns() {
        let df = df![
            "a" => [Some(1), Some(2), Some(3), Some(4)],
            "mostly_null" => [None::<i32>, None, None, Some(1)],
            "b" => [Some("x"), None, Some("y"), Some("z")],
        ]
        .unwrap();

        let pruner = ColumnPruner::new(0.5, 100, vec![]);
        let (out, outcome) = pruner.prune(df).unwrap();

        assert_eq!(names(&out), vec!["a", "b"]);
        assert_eq!(outcome.sparse, vec!["mostly_null".to_string()]);
    }

    #[test]
    fn test_drops_high_cardinality_except_exempt() {
        let df = df![
            "parcel_number" => [1, 2, 3, 4],
            "lat" => [39.1, 39.2, 39.3, 39.4],
            "zoning" => ["RSA5", "RSA5", "RM1", "RM1"],
        ]
        .unwrap();

        let pruner = ColumnPruner::new(0.25, 3, vec!["lat".to_string()]);
        let (out, outcome) = pruner.prune(df).unwrap();

        assert_eq!(names(&out), vec!["lat", "zoning"]);
        assert_eq!(outcome.high_cardinality, vec!["parcel_number".to_string()]);
    }

    #[test]
    fn test_absent_exemption_is_ignored() {
        let df = df!["zoning" => ["RSA5", "RM1"]].unwrap();
        let pruner = ColumnPruner::new(0.25, 100, vec!["lng".to_string()]);
        let (out, outcome) = pruner.prune(df).unwrap();
        assert_eq!(out.width(), 1);
        assert_eq!(outcome.total(), 0);
    }

    #[test]
    fn test_nulls_do_not_count_as_distinct() {
        let df = df!["a" => [Some(1), None, Some(1), None]].unwrap();
        let pruner = ColumnPruner::new(0.25, 1, vec![]);
        let (out, _) = pruner.prune(df).unwrap();
        assert_eq!(out.width(), 1);
    }

    #[test]
    fn test_row_index_is_never_pruned() {
        let df = df!["a" => [1, 2, 3]].unwrap();
        let df = df.with_row_index(ROW_INDEX.into(), None).unwrap();
        let pruner = ColumnPruner::new(0.25, 1, vec![]);
        let (out, outcome) = pruner.prune(df).unwrap();
        assert_eq!(names(&out), vec![ROW_INDEX]);
        assert_eq!(outcome.high_cardinality, vec!["a".to_string()]);
    }
}
