//! Row filters.
//!
//! Every filter keeps the surviving rows in their input order and never
//! touches cell values. A column a filter reads must exist; validity
//! exclusions are normal behavior and never an error.

use crate::error::{PipelineError, Result};
use crate::utils::{filter_rows, missing_mask, numeric_values, text_values};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Stateless row filters over a [`DataFrame`].
pub struct RowFilter;

impl RowFilter {
    /// Keep rows whose value is one of `accepted`. Missing values never match.
    pub fn filter_category(df: &DataFrame, column: &str, accepted: &[String]) -> Result<DataFrame> {
        Self::keep_members(df, column, accepted)
    }

    /// Keep rows whose value belongs to the column's enumerated valid set.
    pub fn filter_domain(df: &DataFrame, column: &str, valid: &[String]) -> Result<DataFrame> {
        Self::keep_members(df, column, valid)
    }

    /// Drop rows whose text contains `needle`. The match is literal and
    /// case-sensitive; missing values are kept.
    pub fn exclude_containing(df: &DataFrame, column: &str, needle: &str) -> Result<DataFrame> {
        let values = text_values(df, column)?;
        let mask: Vec<bool> = values
            .iter()
            .map(|v| v.as_deref().is_none_or(|text| !text.contains(needle)))
            .collect();
        Self::apply(df, column, &mask)
    }

    /// Keep rows whose numeric value is strictly greater than `bound`.
    /// Missing values are dropped.
    pub fn require_greater_than(df: &DataFrame, column: &str, bound: f64) -> Result<DataFrame> {
        let values = numeric_values(df, column)?;
        let mask: Vec<bool> = values
            .iter()
            .map(|v| v.is_some_and(|x| x > bound))
            .collect();
        Self::apply(df, column, &mask)
    }

    /// Drop rows missing a value in any of `columns`. A `NaN` or infinite
    /// number counts as missing.
    pub fn require_present(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        let mut mask = vec![true; df.height()];
        for column in columns {
            for (keep, missing) in mask.iter_mut().zip(missing_mask(df, column)?) {
                if missing {
                    *keep = false;
                }
            }
        }
        Self::apply(df, &columns.join(", "), &mask)
    }

    /// Keep rows whose date year is before `cutoff_year`.
    ///
    /// The year is the first four characters of the value rendered as text,
    /// so `20240105`, `2024-01-05` and `2024-01-05 00:00:00` all read as 2024.
    /// A malformed or missing date halts the run.
    pub fn filter_year_before(
        df: &DataFrame,
        column: &str,
        cutoff_year: i32,
        drop_column: bool,
    ) -> Result<DataFrame> {
        let values = text_values(df, column)?;
        let mut mask = Vec::with_capacity(values.len());
        for value in &values {
            let year = parse_year_prefix(column, value.as_deref())?;
            mask.push(year < cutoff_year);
        }

        let filtered = Self::apply(df, column, &mask)?;
        if drop_column {
            Ok(filtered.drop(column)?)
        } else {
            Ok(filtered)
        }
    }

    fn keep_members(df: &DataFrame, column: &str, members: &[String]) -> Result<DataFrame> {
        let members: HashSet<&str> = members.iter().map(String::as_str).collect();
        let values = text_values(df, column)?;
        let mask: Vec<bool> = values
            .iter()
            .map(|v| v.as_deref().is_some_and(|text| members.contains(text)))
            .collect();
        Self::apply(df, column, &mask)
    }

    fn apply(df: &DataFrame, label: &str, mask: &[bool]) -> Result<DataFrame> {
        let filtered = filter_rows(df, mask)?;
        let removed = df.height() - filtered.height();
        if removed > 0 {
            debug!("Filter on '{}' removed {} rows", label, removed);
        }
        Ok(filtered)
    }
}

/// Parse the four-digit year prefix of a date value.
pub fn parse_year_prefix(column: &str, value: Option<&str>) -> Result<i32> {
    let parse_error = |value: &str, reason: &str| PipelineError::DateParse {
        column: column.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let value = value.ok_or_else(|| parse_error("null", "missing date"))?;
    let prefix = value
        .trim()
        .get(..4)
        .ok_or_else(|| parse_error(value, "shorter than a four digit year"))?;
    if !prefix.chars().all(|c| c.is_ascii_digit()) {
        return Err(parse_error(value, "year prefix is not numeric"));
    }
    prefix
        .parse::<i32>()
        .map_err(|e| parse_error(value, &e.to_string()))
}
