//! Shared utilities for the feature pipeline.
//!
//! This module contains the column access, fill, filtering and statistics
//! helpers used across the stage modules.

use crate::error::{PipelineError, Result, ResultExt};
use polars::prelude::*;
use std::cmp::Ordering;
use std::path::Path;

/// Name of the row-label column attached when the raw table is loaded.
///
/// Stages never treat it as a feature; the writer emits it first as the
/// index column of each artifact.
pub const ROW_INDEX: &str = "__row_index";

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// Column Access Utilities
// =============================================================================

/// Position of a column, or a schema error when it is absent.
pub fn column_position(df: &DataFrame, name: &str) -> Result<usize> {
    df.get_column_index(name)
        .ok_or_else(|| PipelineError::ColumnNotFound(name.to_string()))
}

/// Borrow a column as a Series, or fail with a schema error.
pub fn require_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    column_position(df, name)?;
    Ok(df.column(name)?.as_materialized_series())
}

/// Feature column names in table order (the row-label column excluded).
pub fn feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != ROW_INDEX)
        .map(|name| name.to_string())
        .collect()
}

/// Read a column as text, whatever its stored dtype.
///
/// Integer columns render without a decimal point (`3`), so category codes
/// read from CSV compare equal to their declared spelling.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = require_series(df, name)?;
    let as_text = series.cast(&DataType::String)?;
    let values = as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Read a numeric column as `f64`. Text columns are rejected rather than
/// silently cast to nulls.
///
/// `NaN` and infinite values read as missing.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = require_series(df, name)?;
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::NonNumericColumn {
            column: name.to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    let as_float = series.cast(&DataType::Float64)?;
    Ok(as_float
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Per-row missingness of a column. For numeric columns a non-finite value
/// counts as missing, as it does in [`numeric_values`].
pub fn missing_mask(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let series = require_series(df, name)?;
    if is_numeric_dtype(series.dtype()) {
        return Ok(numeric_values(df, name)?
            .iter()
            .map(Option::is_none)
            .collect());
    }
    Ok(series
        .is_null()
        .into_iter()
        .map(|v| v.unwrap_or(true))
        .collect())
}

// =============================================================================
// I/O Utilities
// =============================================================================

/// Cell spellings read as missing, in every column.
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Read a CSV file with a header row.
///
/// `infer_schema_length` bounds how many rows are scanned for column types;
/// `None` scans the whole file. Cells spelled as one of [`NA_VALUES`] load
/// as nulls.
pub fn load_csv(path: impl AsRef<Path>, infer_schema_length: Option<usize>) -> Result<DataFrame> {
    let path = path.as_ref();
    let null_values = NullValues::AllColumns(NA_VALUES.iter().map(|v| (*v).into()).collect());
    let df = CsvReadOptions::default()
        .with_infer_schema_length(infer_schema_length)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values)),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .context(format!("reading {}", path.display()))?;
    Ok(df)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let as_float = series.cast(&DataType::Float64)?;
    let filled: Float64Chunked = as_float
        .f64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let as_text = series.cast(&DataType::String)?;
    let filled: StringChunked = as_text
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Keep the rows whose mask entry is `true`, preserving order.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Drop `source` and insert `columns` at its former position.
pub fn replace_with_columns(
    mut df: DataFrame,
    source: &str,
    columns: Vec<Series>,
) -> Result<DataFrame> {
    let position = column_position(&df, source)?;
    df = df.drop(source)?;
    for (offset, series) in columns.into_iter().enumerate() {
        df.insert_column(position + offset, series)?;
    }
    Ok(df)
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Quantile of sorted data with linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. Returns `None` for empty input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Finite values of a column, sorted ascending.
pub fn sorted_non_null(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Sort category labels, numerically when every label parses as a number.
pub fn sort_categories(categories: &mut [String]) {
    let all_numeric = categories.iter().all(|c| c.trim().parse::<f64>().is_ok());
    if all_numeric {
        categories.sort_by(|a, b| {
            let a = a.trim().parse::<f64>().unwrap_or(f64::NAN);
            let b = b.trim().parse::<f64>().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
    } else {
        categories.sort();
    }
}

/// Mean and sample standard deviation of the non-null values.
pub fn mean_and_sample_std(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if present.len() < 2 {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

// =============================================================================
// Tests
// =============================================================================
