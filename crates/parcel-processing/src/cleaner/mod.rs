//! Data cleaning stages.
//!
//! This module provides:
//! - Missingness and cardinality column pruning ([`ColumnPruner`])
//! - Strict, named column drops ([`ColumnDropper`])
//! - Row filters: category, placeholder text, numeric bound, completeness,
//!   temporal cutoff and enumerated domain ([`RowFilter`])

mod filters;
mod pruner;

pub use filters::{RowFilter, parse_year_prefix};
pub use pruner::{ColumnPruner, PruneOutcome};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::debug;

/// Drops named columns.
pub struct ColumnDropper;

impl ColumnDropper {
    /// Drop every listed column.
    ///
    /// A column that is not in the table is a schema error; nothing is
    /// dropped in that case.
    pub fn drop_columns(df: DataFrame, columns: &[String]) -> Result<DataFrame> {
        let missing: Vec<&String> = columns
            .iter()
            .filter(|c| df.get_column_index(c).is_none())
            .collect();
        if let Some(first) = missing.first() {
            return Err(PipelineError::ColumnNotFound(first.to_string()));
        }

        debug!("Dropping {} columns: {:?}", columns.len(), columns);
        Ok(df.drop_many(columns.iter().map(|s| PlSmallStr::from(s.as_str()))))
    }
}
