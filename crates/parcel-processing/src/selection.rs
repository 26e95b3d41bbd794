//! High-correlation feature subset.
//!
//! Ranks numeric features by the absolute Pearson correlation with a target
//! column and keeps the ones above a threshold. This is the feature set the
//! downstream regression harness trains its "high correlation" models on.

use crate::error::Result;
use crate::utils::{ROW_INDEX, feature_columns, is_numeric_dtype, numeric_values, require_series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Correlation of one feature with the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    pub column: String,
    pub correlation: f64,
}

/// Selects features whose |r| with `target` is at least `min_abs_correlation`.
#[derive(Debug, Clone)]
pub struct HighCorrelationSelector {
    pub target: String,
    pub min_abs_correlation: f64,
}

impl HighCorrelationSelector {
    pub fn new(target: impl Into<String>, min_abs_correlation: f64) -> Self {
        Self {
            target: target.into(),
            min_abs_correlation,
        }
    }

    /// Correlation of every numeric feature with the target, strongest first.
    ///
    /// Features with no spread (or fewer than two paired values) have no
    /// correlation and are left out of the ranking.
    pub fn rank(&self, df: &DataFrame) -> Result<Vec<FeatureCorrelation>> {
        let target = numeric_values(df, &self.target)?;
        let mut ranking = Vec::new();

        for column in feature_columns(df) {
            if column == self.target {
                continue;
            }
            if !is_numeric_dtype(require_series(df, &column)?.dtype()) {
                continue;
            }
            let values = numeric_values(df, &column)?;
            if let Some(correlation) = pearson(&values, &target) {
                ranking.push(FeatureCorrelation {
                    column,
                    correlation,
                });
            }
        }

        ranking.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(Ordering::Equal)
        });
        Ok(ranking)
    }

    /// The selected features (strongest first) followed by the target.
    ///
    /// The row-label column is carried along when present.
    pub fn select(&self, df: &DataFrame) -> Result<(DataFrame, Vec<FeatureCorrelation>)> {
        let ranking = self.rank(df)?;
        let selected: Vec<FeatureCorrelation> = ranking
            .into_iter()
            .filter(|f| f.correlation.abs() >= self.min_abs_correlation)
            .collect();

        let mut names: Vec<PlSmallStr> = Vec::with_capacity(selected.len() + 2);
        if df.get_column_index(ROW_INDEX).is_some() {
            names.push(ROW_INDEX.into());
        }
        names.extend(selected.iter().map(|f| PlSmallStr::from(f.column.as_str())));
        names.push(self.target.as_str().into());

        debug!(
            "Selected {} features with |r| >= {}",
            selected.len(),
            self.min_abs_correlation
        );
        Ok((df.select(names)?, selected))
    }
}

/// Pearson correlation over the rows where both values are present.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
