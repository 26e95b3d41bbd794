//! Categorical encoders.
//!
//! Every encoder is split in two halves: the unfitted [`Encoder`] holds the
//! parameters written in the manifest, and [`Encoder::fit`] learns whatever
//! the data has to say (category order, first-appearance indices) into a
//! [`FittedEncoder`]. The fitted half is an ordinary value, so it can be kept,
//! inspected and applied to another table without any hidden state.
//!
//! Encoded columns always replace their source column at its position.
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_processing::encoders::{BinaryEncoder, Encoder, FittedEncoder};
//!
//! let fitted = BinaryEncoder::new("zip_code").fit(&train)?;
//! let train = fitted.transform(train)?;
//! let test = fitted.transform(test)?;
//! ```

mod binary;
mod clip;
mod one_hot;
mod ordinal;

pub use binary::{BinaryEncoder, FittedBinaryEncoder};
pub use clip::{ClipEncoder, FittedClipEncoder};
pub use one_hot::{FittedOneHotEncoder, OneHotEncoder};
pub use ordinal::{FittedOrdinalEncoder, OrdinalEncoder};

use crate::error::{PipelineError, Result};
use crate::manifest::first_duplicate;
use crate::utils::{sort_categories, text_values};
use polars::prelude::*;

/// Unfitted encoder: parameters only.
pub trait Encoder {
    /// The fitted encoder type produced by [`Encoder::fit`].
    type Fitted: FittedEncoder;

    /// Learn the encoding from `df`.
    fn fit(&self, df: &DataFrame) -> Result<Self::Fitted>;

    /// Fit on `df` and encode it in one call.
    fn fit_transform(&self, df: DataFrame) -> Result<(DataFrame, Self::Fitted)> {
        let fitted = self.fit(&df)?;
        let encoded = fitted.transform(df)?;
        Ok((encoded, fitted))
    }
}

/// Fitted encoder, ready to transform tables.
pub trait FittedEncoder {
    /// Column the encoder reads (and replaces).
    fn source_column(&self) -> &str;

    /// Names of the columns `transform` writes, in table order.
    fn output_columns(&self) -> Vec<String>;

    /// Replace the source column with its encoding.
    fn transform(&self, df: DataFrame) -> Result<DataFrame>;
}

/// Declared categories, or the sorted distinct values of the column.
fn resolve_categories(
    df: &DataFrame,
    column: &str,
    declared: Option<&Vec<String>>,
) -> Result<Vec<String>> {
    if let Some(declared) = declared {
        if let Some(duplicate) = first_duplicate(declared) {
            return Err(PipelineError::InvalidConfig(format!(
                "category {:?} is declared twice for '{}'",
                duplicate, column
            )));
        }
        return Ok(declared.clone());
    }

    let mut learned: Vec<String> = text_values(df, column)?.into_iter().flatten().collect();
    sort_categories(&mut learned);
    learned.dedup();
    if learned.is_empty() {
        return Err(PipelineError::NoValidValues(column.to_string()));
    }
    Ok(learned)
}

fn unknown_category(column: &str, value: Option<&str>) -> PipelineError {
    PipelineError::UnknownCategory {
        column: column.to_string(),
        value: value.unwrap_or("null").to_string(),
    }
}
