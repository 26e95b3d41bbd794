//! Clamp a numeric column into a fixed range.
//!
//! Used to turn amount columns into indicators: clipping a homestead
//! exemption amount to `[0, 1]` yields 1 for every exempt parcel.

use super::{Encoder, FittedEncoder};
use crate::error::{PipelineError, Result};
use crate::utils::{numeric_values, replace_with_columns};
use polars::prelude::*;

#[derive(Debug, Clone)]
pub struct ClipEncoder {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    pub output: Option<String>,
}

impl ClipEncoder {
    pub fn new(column: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            column: column.into(),
            lower,
            upper,
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl Encoder for ClipEncoder {
    type Fitted = FittedClipEncoder;

    /// Nothing is learned; fitting checks the bounds and the column dtype.
    fn fit(&self, df: &DataFrame) -> Result<FittedClipEncoder> {
        if self.lower.is_nan() || self.upper.is_nan() || self.lower > self.upper {
            return Err(PipelineError::InvalidConfig(format!(
                "clip bounds [{}, {}] are inverted or not numbers",
                self.lower, self.upper
            )));
        }
        numeric_values(df, &self.column)?;
        Ok(FittedClipEncoder {
            column: self.column.clone(),
            output: self
                .output
                .clone()
                .unwrap_or_else(|| format!("{}_encoded", self.column)),
            lower: self.lower,
            upper: self.upper,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FittedClipEncoder {
    column: String,
    output: String,
    lower: f64,
    upper: f64,
}

impl FittedEncoder for FittedClipEncoder {
    fn source_column(&self) -> &str {
        &self.column
    }

    fn output_columns(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    /// Missing cells stay missing.
    fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let clipped: Float64Chunked = numeric_values(&df, &self.column)?
            .into_iter()
            .map(|v| v.map(|x| x.clamp(self.lower, self.upper)))
            .collect();
        let series = clipped.with_name(self.output.as_str().into()).into_series();
        replace_with_columns(df, &self.column, vec![series])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clip_to_indicator() {
        let df = df!["homestead_exemption" => [Some(0i64), Some(80_000), None, Some(45_000)]].unwrap();
        let (out, fitted) = ClipEncoder::new("homestead_exemption", 0.0, 1.0)
            .with_output("homestead_exemption_encoded")
            .fit_transform(df)
            .unwrap();

        assert_eq!(fitted.output_columns(), vec!["homestead_exemption_encoded"]);
        let values: Vec<Option<f64>> = out
            .column("homestead_exemption_encoded")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(0.0), Some(1.0), None, Some(1.0)]);
    }

    #[test]
    fn test_clip_rejects_bad_bounds() {
        let df = df!["homestead_exemption" => [0i64, 80_000]].unwrap();
        for (lower, upper) in [(1.0, 0.0), (f64::NAN, 1.0), (0.0, f64::NAN)] {
            let err = ClipEncoder::new("homestead_exemption", lower, upper)
                .fit(&df)
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_clip_rejects_text() {
        let df = df!["zoning" => ["RSA5"]].unwrap();
        assert!(ClipEncoder::new("zoning", 0.0, 1.0).fit(&df).is_err());
    }
}
