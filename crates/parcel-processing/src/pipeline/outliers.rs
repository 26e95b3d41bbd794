//! Outlier handling module.
//!
//! Winsorized IQR removal: the column is first capped at two percentiles,
//! and the IQR fence is computed on the capped copy. Extreme values are then
//! unable to widen the fence that is meant to catch them.

use crate::error::{PipelineError, Result};
use crate::utils::{filter_rows, numeric_values, quantile_sorted, replace_with_columns, sorted_non_null};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Multiplier applied to the IQR to place the fences.
pub const IQR_FENCE_FACTOR: f64 = 1.5;

/// Statistics of one winsorized IQR pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub column: String,
    pub cap_low: f64,
    pub cap_high: f64,
    pub q1: f64,
    pub q3: f64,
    pub fence_low: f64,
    pub fence_high: f64,
    pub rows_removed: usize,
}

/// Winsorized IQR row removal for one column.
#[derive(Debug, Clone)]
pub struct OutlierRemover {
    pub column: String,
    /// Lower cap, as a percentile in `[0, 100]`.
    pub lower_percentile: f64,
    /// Upper cap, as a percentile in `[0, 100]`.
    pub upper_percentile: f64,
}

impl OutlierRemover {
    pub fn new(column: impl Into<String>, lower_percentile: f64, upper_percentile: f64) -> Self {
        Self {
            column: column.into(),
            lower_percentile,
            upper_percentile,
        }
    }

    /// Name of the capped column that replaces the raw one.
    pub fn capped_name(&self) -> String {
        format!("{}_capped", self.column)
    }

    /// Both caps must lie in `[0, 100]` with the lower one strictly below.
    fn check_percentiles(&self) -> Result<()> {
        let (lower, upper) = (self.lower_percentile, self.upper_percentile);
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(lower) || !in_range(upper) || lower >= upper {
            return Err(PipelineError::InvalidConfig(format!(
                "outlier percentiles for '{}' must satisfy 0 <= lower < upper <= 100, got {} and {}",
                self.column, lower, upper
            )));
        }
        Ok(())
    }

    /// Cap, fence and filter.
    ///
    /// The raw column is replaced by `<column>_capped` at its position. Rows
    /// whose capped value falls outside the fence are removed; a missing
    /// value is never inside the fence.
    pub fn apply(&self, df: DataFrame) -> Result<(DataFrame, OutlierBounds)> {
        self.check_percentiles()?;
        let values = numeric_values(&df, &self.column)?;
        let sorted = sorted_non_null(&values);
        let no_values = || PipelineError::NoValidValues(self.column.clone());

        let cap_low = quantile_sorted(&sorted, self.lower_percentile / 100.0).ok_or_else(no_values)?;
        let cap_high = quantile_sorted(&sorted, self.upper_percentile / 100.0).ok_or_else(no_values)?;

        let capped: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.map(|x| x.clamp(cap_low, cap_high)))
            .collect();

        let capped_sorted = sorted_non_null(&capped);
        let q1 = quantile_sorted(&capped_sorted, 0.25).ok_or_else(no_values)?;
        let q3 = quantile_sorted(&capped_sorted, 0.75).ok_or_else(no_values)?;
        let iqr = q3 - q1;
        let fence_low = q1 - IQR_FENCE_FACTOR * iqr;
        let fence_high = q3 + IQR_FENCE_FACTOR * iqr;

        let mask: Vec<bool> = capped
            .iter()
            .map(|v| v.is_some_and(|x| x >= fence_low && x <= fence_high))
            .collect();

        let capped_series: Float64Chunked = capped.into_iter().collect();
        let capped_series = capped_series
            .with_name(self.capped_name().into())
            .into_series();

        let before = df.height();
        let df = replace_with_columns(df, &self.column, vec![capped_series])?;
        let df = filter_rows(&df, &mask)?;
        let rows_removed = before - df.height();

        debug!(
            "'{}': caps [{:.3}, {:.3}], fence [{:.3}, {:.3}], removed {} rows",
            self.column, cap_low, cap_high, fence_low, fence_high, rows_removed
        );

        Ok((
            df,
            OutlierBounds {
                column: self.column.clone(),
                cap_low,
                cap_high,
                q1,
                q3,
                fence_low,
                fence_high,
                rows_removed,
            },
        ))
    }
}
