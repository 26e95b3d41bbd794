//! Binary (bit-packed) encoding for high-cardinality nominal columns.
//!
//! Each distinct category gets a 1-based index in order of first appearance.
//! The index is written in `w = bit_length(k)` binary digits, most
//! significant first, one output column per digit. A column with 300 zip
//! codes needs 9 columns instead of 300.

use super::{Encoder, FittedEncoder};
use crate::error::{PipelineError, Result};
use crate::utils::{replace_with_columns, text_values};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BinaryEncoder {
    pub column: String,
}

impl BinaryEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Encoder for BinaryEncoder {
    type Fitted = FittedBinaryEncoder;

    fn fit(&self, df: &DataFrame) -> Result<FittedBinaryEncoder> {
        let mut indices: HashMap<String, u64> = HashMap::new();
        let mut next = 1u64;
        for value in text_values(df, &self.column)?.into_iter().flatten() {
            indices.entry(value).or_insert_with(|| {
                let index = next;
                next += 1;
                index
            });
        }

        if indices.is_empty() {
            return Err(PipelineError::NoValidValues(self.column.clone()));
        }

        let width = bit_length(indices.len() as u64);
        debug!(
            "Binary encoding '{}': {} categories in {} digits",
            self.column,
            indices.len(),
            width
        );
        Ok(FittedBinaryEncoder {
            column: self.column.clone(),
            indices,
            width,
        })
    }
}

/// Learned first-appearance index of every category.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedBinaryEncoder {
    column: String,
    indices: HashMap<String, u64>,
    width: usize,
}

impl FittedBinaryEncoder {
    /// Index of a category; 0 for categories not seen at fit time.
    pub fn index_of(&self, category: Option<&str>) -> u64 {
        category
            .and_then(|c| self.indices.get(c))
            .copied()
            .unwrap_or(0)
    }

    /// Number of digit columns.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn category_count(&self) -> usize {
        self.indices.len()
    }
}

impl FittedEncoder for FittedBinaryEncoder {
    fn source_column(&self) -> &str {
        &self.column
    }

    fn output_columns(&self) -> Vec<String> {
        (0..self.width)
            .map(|digit| format!("{}_{}", self.column, digit))
            .collect()
    }

    fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let values = text_values(&df, &self.column)?;
        let mut digits = vec![Vec::with_capacity(values.len()); self.width];
        for value in &values {
            let index = self.index_of(value.as_deref());
            for (position, column) in digits.iter_mut().enumerate() {
                let shift = self.width - 1 - position;
                column.push(((index >> shift) & 1) as i64);
            }
        }

        let columns = self
            .output_columns()
            .into_iter()
            .zip(digits)
            .map(|(name, values)| Series::new(name.into(), values))
            .collect();
        replace_with_columns(df, &self.column, columns)
    }
}

/// Number of binary digits needed to write `n`.
fn bit_length(n: u64) -> usize {
    (u64::BITS - n.leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(df: &DataFrame, outputs: &[String], row: usize) -> u64 {
        outputs.iter().fold(0, |acc, name| {
            let digit = df.column(name).unwrap().i64().unwrap().get(row).unwrap();
            (acc << 1) | digit as u64
        })
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(2), 2);
        assert_eq!(bit_length(3), 2);
        assert_eq!(bit_length(4), 3);
        assert_eq!(bit_length(300), 9);
    }

    #[test]
    fn test_decoding_reproduces_first_appearance_index() {
        let df = df!["zip_code" => ["19104", "19143", "19104", "19120", "19147"]].unwrap();
        let (out, fitted) = BinaryEncoder::new("zip_code").fit_transform(df).unwrap();

        let outputs = fitted.output_columns();
        assert_eq!(outputs, vec!["zip_code_0", "zip_code_1", "zip_code_2"]);

        let decoded: Vec<u64> = (0..out.height()).map(|r| decode(&out, &outputs, r)).collect();
        assert_eq!(decoded, vec![1, 2, 1, 3, 4]);
    }

    #[test]
    fn test_index_is_stable_across_runs() {
        let df = df!["zoning" => ["RSA5", "RM1", "CMX2", "RSA5"]].unwrap();
        let first = BinaryEncoder::new("zoning").fit(&df).unwrap();
        let second = BinaryEncoder::new("zoning").fit(&df).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.index_of(Some("CMX2")), 3);
    }

    #[test]
    fn test_unseen_and_missing_encode_as_zero() {
        let train = df!["street_designation" => ["ST", "AVE"]].unwrap();
        let fitted = BinaryEncoder::new("street_designation").fit(&train).unwrap();

        let test = df!["street_designation" => [Some("RD"), None, Some("AVE")]].unwrap();
        let out = fitted.transform(test).unwrap();
        let outputs = fitted.output_columns();
        assert_eq!(decode(&out, &outputs, 0), 0);
        assert_eq!(decode(&out, &outputs, 1), 0);
        assert_eq!(decode(&out, &outputs, 2), 2);
    }

    #[test]
    fn test_numeric_source_column() {
        let df = df!["year_built" => [1925i64, 1950, 1925]].unwrap();
        let (out, fitted) = BinaryEncoder::new("year_built").fit_transform(df).unwrap();
        assert_eq!(fitted.category_count(), 2);
        assert_eq!(fitted.width(), 2);
        assert!(out.column("year_built").is_err());
        assert_eq!(out.width(), 2);
    }
}
