//! Z-score standardization.
//!
//! The scaler is fitted per column (mean and sample standard deviation) and
//! writes the scaled columns first, in the listed order, followed by every
//! other column in its original relative order.

use crate::error::{PipelineError, Result};
use crate::manifest::ZeroVariancePolicy;
use crate::utils::{mean_and_sample_std, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Unfitted standard scaler.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub on_zero_variance: ZeroVariancePolicy,
}

/// Learned location and spread of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    /// `None` when the column has no spread and the policy maps it to zero.
    pub std: Option<f64>,
}

impl StandardScaler {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            on_zero_variance: ZeroVariancePolicy::default(),
        }
    }

    pub fn on_zero_variance(mut self, policy: ZeroVariancePolicy) -> Self {
        self.on_zero_variance = policy;
        self
    }

    pub fn fit(&self, df: &DataFrame) -> Result<FittedStandardScaler> {
        let mut scales = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let values = numeric_values(df, column)?;
            let scale = match mean_and_sample_std(&values) {
                Some((mean, std)) if std > 0.0 && std.is_finite() => ColumnScale {
                    column: column.clone(),
                    mean,
                    std: Some(std),
                },
                stats => match self.on_zero_variance {
                    ZeroVariancePolicy::Fail => {
                        return Err(PipelineError::ZeroVariance(column.clone()));
                    }
                    ZeroVariancePolicy::Zero => {
                        warn!("Column '{}' has zero variance, scaling to 0.0", column);
                        ColumnScale {
                            column: column.clone(),
                            mean: stats.map(|(mean, _)| mean).unwrap_or(0.0),
                            std: None,
                        }
                    }
                },
            };
            scales.push(scale);
        }
        Ok(FittedStandardScaler { scales })
    }
}

/// Per-column statistics learned by a [`StandardScaler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    scales: Vec<ColumnScale>,
}

impl FittedStandardScaler {
    pub fn scales(&self) -> &[ColumnScale] {
        &self.scales
    }

    /// Scale the fitted columns and move them to the front.
    ///
    /// Missing cells stay missing.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(df.width());

        for scale in &self.scales {
            let values = numeric_values(df, &scale.column)?;
            let scaled: Float64Chunked = values
                .into_iter()
                .map(|v| {
                    v.map(|x| match scale.std {
                        Some(std) => (x - scale.mean) / std,
                        None => 0.0,
                    })
                })
                .collect();
            columns.push(
                scaled
                    .with_name(scale.column.as_str().into())
                    .into_series()
                    .into(),
            );
        }

        for column in df.get_columns() {
            let name = column.name().as_str();
            if self.scales.iter().any(|s| s.column == name) {
                continue;
            }
            columns.push(column.clone());
        }

        debug!(
            "Scaled {} columns, {} passed through",
            self.scales.len(),
            columns.len() - self.scales.len()
        );
        Ok(DataFrame::new(columns)?)
    }
}
