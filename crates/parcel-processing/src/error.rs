//! Custom error types for the feature pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Every failure
//! raised while a manifest step runs is wrapped with the step it came from, so
//! the message a user sees names both the stage and the column at fault.
//!
//! Errors are serializable so that `--json` output can carry them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Column was not found in the dataset (schema drift).
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A date field did not start with a four digit year.
    #[error("Failed to parse year from column '{column}' value {value:?}: {reason}")]
    DateParse {
        column: String,
        value: String,
        reason: String,
    },

    /// An encoder met a category it was not fitted on.
    #[error("Unknown category {value:?} in column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// Standardization over a column with no spread.
    #[error("Column '{0}' has zero variance and cannot be standardized")]
    ZeroVariance(String),

    /// A numeric operation was requested on a non-numeric column.
    #[error("Column '{column}' has dtype {dtype}, expected a numeric column")]
    NonNumericColumn { column: String, dtype: String },

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// A computation needs more rows than the table holds.
    #[error("{operation} needs at least {needed} rows, found {found}")]
    InsufficientRows {
        operation: String,
        needed: usize,
        found: usize,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The step manifest is malformed.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::DateParse { .. } => "DATE_PARSE_FAILED",
            Self::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            Self::ZeroVariance(_) => "ZERO_VARIANCE",
            Self::NonNumericColumn { .. } => "NON_NUMERIC_COLUMN",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::InsufficientRows { .. } => "INSUFFICIENT_ROWS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidManifest(_) => "INVALID_MANIFEST",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Schema errors signal that the upstream data contract changed.
    pub fn is_schema_error(&self) -> bool {
        matches!(self.root(), Self::ColumnNotFound(_))
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
