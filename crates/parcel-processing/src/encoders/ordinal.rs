//! Ordinal encoding.

use super::{Encoder, FittedEncoder, resolve_categories, unknown_category};
use crate::error::Result;
use crate::utils::{filter_rows, replace_with_columns, text_values};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Maps an ordered category list to ranks `0..k`.
///
/// With no declared list the sorted distinct values seen at fit time are
/// used (numeric-aware, so `"10"` ranks after `"9"`).
#[derive(Debug, Clone)]
pub struct OrdinalEncoder {
    pub column: String,
    pub categories: Option<Vec<String>>,
    pub output: Option<String>,
    /// Rows whose encoded rank is listed here are dropped after encoding.
    pub exclude_codes: Vec<u32>,
}

impl OrdinalEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            categories: None,
            output: None,
            exclude_codes: Vec::new(),
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_exclude_codes(mut self, codes: Vec<u32>) -> Self {
        self.exclude_codes = codes;
        self
    }
}

impl Encoder for OrdinalEncoder {
    type Fitted = FittedOrdinalEncoder;

    fn fit(&self, df: &DataFrame) -> Result<FittedOrdinalEncoder> {
        let categories = resolve_categories(df, &self.column, self.categories.as_ref())?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| format!("{}_encoded", self.column));
        debug!(
            "Ordinal order for '{}': {:?}",
            self.column, categories
        );
        Ok(FittedOrdinalEncoder {
            column: self.column.clone(),
            output,
            categories,
            exclude_codes: self.exclude_codes.clone(),
        })
    }
}

/// Learned rank table of an [`OrdinalEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedOrdinalEncoder {
    column: String,
    output: String,
    categories: Vec<String>,
    exclude_codes: Vec<u32>,
}

impl FittedOrdinalEncoder {
    /// Categories in rank order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Rank of a category, if it was fitted.
    pub fn rank(&self, category: &str) -> Option<u32> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|p| p as u32)
    }
}

impl FittedEncoder for FittedOrdinalEncoder {
    fn source_column(&self) -> &str {
        &self.column
    }

    fn output_columns(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let ranks: HashMap<&str, u32> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as u32))
            .collect();

        let values = text_values(&df, &self.column)?;
        let mut encoded = Vec::with_capacity(values.len());
        for value in &values {
            let rank = value
                .as_deref()
                .and_then(|v| ranks.get(v))
                .ok_or_else(|| unknown_category(&self.column, value.as_deref()))?;
            encoded.push(*rank as i64);
        }

        let keep: Vec<bool> = encoded
            .iter()
            .map(|rank| !self.exclude_codes.contains(&(*rank as u32)))
            .collect();

        let series = Series::new(self.output.as_str().into(), encoded);
        let df = replace_with_columns(df, &self.column, vec![series])?;

        if keep.iter().all(|k| *k) {
            return Ok(df);
        }
        let filtered = filter_rows(&df, &keep)?;
        debug!(
            "Excluded {} rows with codes {:?} in '{}'",
            df.height() - filtered.height(),
            self.exclude_codes,
            self.output
        );
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::BASEMENT_CODES;
    use crate::error::PipelineError;
    use pretty_assertions::assert_eq;

    fn ranks(df: &DataFrame, column: &str) -> Vec<i64> {
        df.column(column)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_declared_order_is_a_bijection() {
        let df = df!["basements" => ["0", "K", "C", "A"]].unwrap();
        let encoder = OrdinalEncoder::new("basements")
            .with_categories(BASEMENT_CODES)
            .with_output("basements_encoded");
        let (out, fitted) = encoder.fit_transform(df).unwrap();

        assert_eq!(ranks(&out, "basements_encoded"), vec![0, 11, 3, 1]);
        assert!(out.column("basements").is_err());
        for (i, code) in BASEMENT_CODES.iter().enumerate() {
            assert_eq!(fitted.rank(code), Some(i as u32));
        }
    }

    #[test]
    fn test_learned_order_is_numeric_aware() {
        let df = df!["exterior_condition" => [4i64, 2, 10, 2]].unwrap();
        let (out, fitted) = OrdinalEncoder::new("exterior_condition")
            .fit_transform(df)
            .unwrap();

        assert_eq!(fitted.categories(), &["2", "4", "10"]);
        assert_eq!(ranks(&out, "exterior_condition_encoded"), vec![1, 0, 2, 0]);
    }

    #[test]
    fn test_unseen_category_fails() {
        let train = df!["type_heater" => ["A", "B"]].unwrap();
        let fitted = OrdinalEncoder::new("type_heater").fit(&train).unwrap();

        let test = df!["type_heater" => ["A", "Z"]].unwrap();
        let err = fitted.transform(test).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory { value, .. } if value == "Z"));
    }

    #[test]
    fn test_duplicate_declared_category_fails_at_fit() {
        let df = df!["basements" => ["A", "B"]].unwrap();
        let err = OrdinalEncoder::new("basements")
            .with_categories(["A", "B", "A"])
            .fit(&df)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(err.to_string().contains("basements"));
    }

    #[test]
    fn test_missing_value_fails() {
        let df = df!["type_heater" => [Some("A"), None]].unwrap();
        let encoder = OrdinalEncoder::new("type_heater").with_categories(["A", "B"]);
        assert!(encoder.fit_transform(df).is_err());
    }

    #[test]
    fn test_exclude_codes_filters_on_encoded_value() {
        // learned order: 1 -> 0, 3 -> 1, 4 -> 2, 9 -> 3
        let df = df![
            "interior_condition" => [3i64, 1, 4, 9, 3],
            "id" => [1, 2, 3, 4, 5],
        ]
        .unwrap();
        let encoder = OrdinalEncoder::new("interior_condition")
            .with_output("interior_encoded")
            .with_exclude_codes(vec![0, 3]);
        let (out, _) = encoder.fit_transform(df).unwrap();

        assert_eq!(ranks(&out, "interior_encoded"), vec![1, 2, 1]);
        let ids: Vec<i32> = out.column("id").unwrap().i32().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_output_takes_source_position() {
        let df = df![
            "a" => [1],
            "basements" => ["A"],
            "b" => [2],
        ]
        .unwrap();
        let (out, _) = OrdinalEncoder::new("basements").fit_transform(df).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["a", "basements_encoded", "b"]);
    }
}
