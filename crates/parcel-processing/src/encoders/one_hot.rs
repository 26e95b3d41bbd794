//! One-hot encoding.

use super::{Encoder, FittedEncoder, resolve_categories, unknown_category};
use crate::error::Result;
use crate::utils::{replace_with_columns, text_values};
use polars::prelude::*;
use std::collections::HashMap;

/// One indicator column per category, full rank (no category is dropped).
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    pub column: String,
    pub categories: Option<Vec<String>>,
}

impl OneHotEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            categories: None,
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
}

impl Encoder for OneHotEncoder {
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, df: &DataFrame) -> Result<FittedOneHotEncoder> {
        let categories = resolve_categories(df, &self.column, self.categories.as_ref())?;
        Ok(FittedOneHotEncoder {
            column: self.column.clone(),
            categories,
        })
    }
}

/// Category list of a fitted [`OneHotEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedOneHotEncoder {
    column: String,
    categories: Vec<String>,
}

impl FittedOneHotEncoder {
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

impl FittedEncoder for FittedOneHotEncoder {
    fn source_column(&self) -> &str {
        &self.column
    }

    /// `<column>_<category>`, in category order.
    fn output_columns(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, c))
            .collect()
    }

    fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let slots: HashMap<&str, usize> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let values = text_values(&df, &self.column)?;
        let mut indicators = vec![vec![0.0f64; values.len()]; self.categories.len()];
        for (row, value) in values.iter().enumerate() {
            let slot = value
                .as_deref()
                .and_then(|v| slots.get(v))
                .ok_or_else(|| unknown_category(&self.column, value.as_deref()))?;
            indicators[*slot][row] = 1.0;
        }

        let columns = self
            .output_columns()
            .into_iter()
            .zip(indicators)
            .map(|(name, values)| Series::new(name.into(), values))
            .collect();
        replace_with_columns(df, &self.column, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::VIEW_TYPE_CODES;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exactly_one_indicator_per_row() {
        let df = df!["view_type" => ["I", "0", "B", "I"]].unwrap();
        let encoder = OneHotEncoder::new("view_type").with_categories(VIEW_TYPE_CODES);
        let (out, fitted) = encoder.fit_transform(df).unwrap();

        let outputs = fitted.output_columns();
        assert_eq!(outputs.len(), VIEW_TYPE_CODES.len());
        assert_eq!(outputs[0], "view_type_I");
        assert_eq!(outputs[5], "view_type_0");

        for row in 0..out.height() {
            let total: f64 = outputs
                .iter()
                .map(|c| out.column(c).unwrap().f64().unwrap().get(row).unwrap())
                .sum();
            assert_eq!(total, 1.0);
        }
        assert_eq!(out.column("view_type_0").unwrap().f64().unwrap().get(1), Some(1.0));
    }

    #[test]
    fn test_indicator_names_follow_declared_order() {
        let df = df!["topography" => ["F", "A"]].unwrap();
        let (out, _) = OneHotEncoder::new("topography")
            .with_categories(["F", "A"])
            .fit_transform(df)
            .unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["topography_F", "topography_A"]);
    }

    #[test]
    fn test_learned_categories_are_sorted() {
        let df = df!["parcel_shape" => ["E", "A", "C"]].unwrap();
        let fitted = OneHotEncoder::new("parcel_shape").fit(&df).unwrap();
        assert_eq!(fitted.categories(), &["A", "C", "E"]);
    }

    #[test]
    fn test_unseen_category_fails() {
        let df = df!["parcel_shape" => ["A", "Q"]].unwrap();
        let encoder = OneHotEncoder::new("parcel_shape").with_categories(["A", "B"]);
        assert_eq!(
            encoder.fit_transform(df).unwrap_err().error_code(),
            "UNKNOWN_CATEGORY"
        );
    }
}
