//! Sentinel imputation.
//!
//! Fills the missing cells of a fixed set of columns with a domain code that
//! stands for "unknown" or "not applicable". No statistic is learned.

use crate::error::{PipelineError, Result};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, is_numeric_dtype, require_series};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-column sentinel fill.
#[derive(Debug, Clone, Default)]
pub struct SentinelImputer {
    fills: BTreeMap<String, String>,
}

impl SentinelImputer {
    pub fn new(fills: BTreeMap<String, String>) -> Self {
        Self { fills }
    }

    /// Fill missing cells of the mapped columns, returning the table and the
    /// number of cells filled per column.
    ///
    /// Text columns take the sentinel verbatim. Numeric columns require a
    /// numeric sentinel; integer columns stay integer when the sentinel is
    /// integral.
    pub fn impute(&self, mut df: DataFrame) -> Result<(DataFrame, BTreeMap<String, usize>)> {
        let mut filled_counts = BTreeMap::new();

        for (column, sentinel) in &self.fills {
            let series = require_series(&df, column)?;
            let missing = series.null_count();
            filled_counts.insert(column.clone(), missing);
            if missing == 0 {
                continue;
            }

            let filled = if is_numeric_dtype(series.dtype()) {
                let value: f64 = sentinel.trim().parse().map_err(|_| {
                    PipelineError::InvalidConfig(format!(
                        "sentinel {:?} for numeric column '{}' is not a number",
                        sentinel, column
                    ))
                })?;
                let as_float = fill_numeric_nulls(series, value)?;
                if series.dtype().is_integer() && value.fract() == 0.0 {
                    as_float.cast(series.dtype())?
                } else {
                    as_float
                }
            } else {
                fill_string_nulls(series, sentinel)?
            };

            debug!("Filled {} cells of '{}' with {:?}", missing, column, sentinel);
            df.replace(column, filled)?;
        }

        Ok((df, filled_counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fills(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fills_only_mapped_column() {
        let df = df![
            "basements" => [None, Some("A")],
            "fireplaces" => [None::<i64>, Some(1)],
        ]
        .unwrap();

        let imputer = SentinelImputer::new(fills(&[("basements", "K")]));
        let (out, counts) = imputer.impute(df.clone()).unwrap();

        let basements: Vec<Option<&str>> =
            out.column("basements").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(basements, vec![Some("K"), Some("A")]);
        let before = df.column("fireplaces").unwrap().as_materialized_series();
        let after = out.column("fireplaces").unwrap().as_materialized_series();
        assert!(after.equals_missing(before));
        assert_eq!(counts.get("basements"), Some(&1));
    }

    #[test]
    fn test_numeric_sentinel_keeps_integer_dtype() {
        let df = df!["garage_spaces" => [Some(2i64), None]].unwrap();
        let imputer = SentinelImputer::new(fills(&[("garage_spaces", "0")]));
        let (out, _) = imputer.impute(df).unwrap();

        let col = out.column("garage_spaces").unwrap();
        assert_eq!(col.dtype(), &DataType::Int64);
        assert_eq!(col.i64().unwrap().get(1), Some(0));
    }

    #[test]
    fn test_text_sentinel_for_numeric_column_is_rejected() {
        let df = df!["garage_spaces" => [Some(2i64), None]].unwrap();
        let imputer = SentinelImputer::new(fills(&[("garage_spaces", "K")]));
        let err = imputer.impute(df).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_mapped_column_must_exist() {
        let df = df!["basements" => ["A"]].unwrap();
        let imputer = SentinelImputer::new(fills(&[("topography", "F")]));
        assert!(imputer.impute(df).unwrap_err().is_schema_error());
    }
}
