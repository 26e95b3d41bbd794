//! Declarative step manifest.
//!
//! A [`Manifest`] is an ordered list of [`Step`]s. Each step names an action,
//! the column(s) it touches and its parameters; the executor interprets the
//! steps one after another, so the whole pipeline can be read, diffed and
//! serialized as data.
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_processing::manifest::{Manifest, Step};
//!
//! let manifest = Manifest::new(vec![
//!     Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
//!     Step::require_present(["depth", "frontage"]),
//!     Step::remove_outliers("depth"),
//!     Step::Checkpoint,
//!     Step::scale(["depth_capped"]),
//! ]);
//! manifest.validate()?;
//! ```

use crate::error::{PipelineError, Result};
use crate::pipeline::progress::PreprocessingStage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Default fraction of non-missing values a column needs to survive pruning.
pub const DEFAULT_MIN_PRESENT_FRACTION: f64 = 0.25;

/// Default distinct-value count above which a column is pruned.
pub const DEFAULT_MAX_DISTINCT: usize = 116_000;

/// Default year cutoff for the temporal filter (rows must be strictly earlier).
pub const DEFAULT_CUTOFF_YEAR: i32 = 2024;

fn default_min_present_fraction() -> f64 {
    DEFAULT_MIN_PRESENT_FRACTION
}

fn default_max_distinct() -> usize {
    DEFAULT_MAX_DISTINCT
}

fn default_cutoff_year() -> i32 {
    DEFAULT_CUTOFF_YEAR
}

fn default_lower_percentile() -> f64 {
    5.0
}

fn default_upper_percentile() -> f64 {
    95.0
}

fn default_true() -> bool {
    true
}

/// What the scaler does with a column whose standard deviation is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Abort the run with [`PipelineError::ZeroVariance`].
    #[default]
    Fail,
    /// Emit 0.0 for every present value.
    Zero,
}

/// One action of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Drop sparse columns, then high-cardinality columns not in `exempt`.
    PruneColumns {
        #[serde(default = "default_min_present_fraction")]
        min_present_fraction: f64,
        #[serde(default = "default_max_distinct")]
        max_distinct: usize,
        #[serde(default)]
        exempt: Vec<String>,
    },
    /// Keep rows whose value is one of `accepted`.
    FilterCategory {
        column: String,
        accepted: Vec<String>,
    },
    /// Drop columns; every column must exist.
    DropColumns { columns: Vec<String> },
    /// Drop rows whose text contains `needle` (literal, case-sensitive).
    ExcludeContaining { column: String, needle: String },
    /// Keep rows whose value is strictly greater than `bound`.
    RequireGreaterThan { column: String, bound: f64 },
    /// Fill missing cells of each mapped column with its sentinel.
    Impute { fills: BTreeMap<String, String> },
    /// Drop rows missing a value in any listed column.
    RequirePresent { columns: Vec<String> },
    /// Keep rows whose date year is before `cutoff_year`.
    FilterYearBefore {
        column: String,
        #[serde(default = "default_cutoff_year")]
        cutoff_year: i32,
        #[serde(default = "default_true")]
        drop_column: bool,
    },
    /// Keep rows whose value is in the enumerated `valid` set.
    FilterDomain { column: String, valid: Vec<String> },
    /// Ordinal encoding; `categories` fixes the rank order.
    EncodeOrdinal {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        categories: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        exclude_codes: Vec<u32>,
    },
    /// One indicator column per category.
    EncodeOneHot {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        categories: Option<Vec<String>>,
    },
    /// Bit-packed index encoding for high-cardinality columns.
    EncodeBinary { column: String },
    /// Clamp a numeric column into `[lower, upper]`.
    Clip {
        column: String,
        lower: f64,
        upper: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    /// Winsorized IQR row removal.
    RemoveOutliers {
        column: String,
        #[serde(default = "default_lower_percentile")]
        lower_percentile: f64,
        #[serde(default = "default_upper_percentile")]
        upper_percentile: f64,
    },
    /// Snapshot the table as the checkpoint artifact.
    Checkpoint,
    /// Standardize the listed columns and move them to the front.
    Scale {
        columns: Vec<String>,
        #[serde(default)]
        on_zero_variance: ZeroVariancePolicy,
    },
}

impl Step {
    pub fn filter_category<I, S>(column: impl Into<String>, accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::FilterCategory {
            column: column.into(),
            accepted: strings(accepted),
        }
    }

    pub fn drop_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::DropColumns {
            columns: strings(columns),
        }
    }

    pub fn require_present<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::RequirePresent {
            columns: strings(columns),
        }
    }

    pub fn filter_domain<I, S>(column: impl Into<String>, valid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::FilterDomain {
            column: column.into(),
            valid: strings(valid),
        }
    }

    /// Winsorized IQR removal with the default 5th/95th percentile caps.
    pub fn remove_outliers(column: impl Into<String>) -> Self {
        Step::RemoveOutliers {
            column: column.into(),
            lower_percentile: default_lower_percentile(),
            upper_percentile: default_upper_percentile(),
        }
    }

    pub fn scale<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::Scale {
            columns: strings(columns),
            on_zero_variance: ZeroVariancePolicy::default(),
        }
    }

    /// The snake_case action name, as written in manifest JSON.
    pub fn action(&self) -> &'static str {
        match self {
            Step::PruneColumns { .. } => "prune_columns",
            Step::FilterCategory { .. } => "filter_category",
            Step::DropColumns { .. } => "drop_columns",
            Step::ExcludeContaining { .. } => "exclude_containing",
            Step::RequireGreaterThan { .. } => "require_greater_than",
            Step::Impute { .. } => "impute",
            Step::RequirePresent { .. } => "require_present",
            Step::FilterYearBefore { .. } => "filter_year_before",
            Step::FilterDomain { .. } => "filter_domain",
            Step::EncodeOrdinal { .. } => "encode_ordinal",
            Step::EncodeOneHot { .. } => "encode_one_hot",
            Step::EncodeBinary { .. } => "encode_binary",
            Step::Clip { .. } => "clip",
            Step::RemoveOutliers { .. } => "remove_outliers",
            Step::Checkpoint => "checkpoint",
            Step::Scale { .. } => "scale",
        }
    }

    /// The pipeline stage this step belongs to, for progress reporting.
    pub fn stage(&self) -> PreprocessingStage {
        match self {
            Step::PruneColumns { .. } => PreprocessingStage::Pruning,
            Step::DropColumns { .. } => PreprocessingStage::Dropping,
            Step::FilterCategory { .. }
            | Step::ExcludeContaining { .. }
            | Step::RequireGreaterThan { .. }
            | Step::RequirePresent { .. }
            | Step::FilterYearBefore { .. }
            | Step::FilterDomain { .. } => PreprocessingStage::Filtering,
            Step::Impute { .. } => PreprocessingStage::Imputation,
            Step::EncodeOrdinal { .. }
            | Step::EncodeOneHot { .. }
            | Step::EncodeBinary { .. }
            | Step::Clip { .. } => PreprocessingStage::Encoding,
            Step::RemoveOutliers { .. } => PreprocessingStage::OutlierRemoval,
            Step::Checkpoint => PreprocessingStage::Checkpoint,
            Step::Scale { .. } => PreprocessingStage::Scaling,
        }
    }

    /// Columns the step reads; all of them must exist when it runs.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Step::PruneColumns { .. } | Step::Checkpoint => Vec::new(),
            Step::DropColumns { columns }
            | Step::RequirePresent { columns }
            | Step::Scale { columns, .. } => columns.clone(),
            Step::Impute { fills } => fills.keys().cloned().collect(),
            Step::FilterCategory { column, .. }
            | Step::ExcludeContaining { column, .. }
            | Step::RequireGreaterThan { column, .. }
            | Step::FilterYearBefore { column, .. }
            | Step::FilterDomain { column, .. }
            | Step::EncodeOrdinal { column, .. }
            | Step::EncodeOneHot { column, .. }
            | Step::EncodeBinary { column }
            | Step::Clip { column, .. }
            | Step::RemoveOutliers { column, .. } => vec![column.clone()],
        }
    }

    /// Whether the step only removes rows (never touches columns or values).
    pub fn is_row_filter(&self) -> bool {
        matches!(
            self,
            Step::FilterCategory { .. }
                | Step::ExcludeContaining { .. }
                | Step::RequireGreaterThan { .. }
                | Step::RequirePresent { .. }
                | Step::FilterDomain { .. }
        )
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Step::PruneColumns {
                min_present_fraction,
                ..
            } => {
                if !(0.0..=1.0).contains(min_present_fraction) {
                    return Err(format!(
                        "min_present_fraction {} must be between 0.0 and 1.0",
                        min_present_fraction
                    ));
                }
            }
            Step::FilterCategory { accepted, .. } if accepted.is_empty() => {
                return Err("accepted set is empty".to_string());
            }
            Step::FilterDomain { valid, .. } if valid.is_empty() => {
                return Err("valid set is empty".to_string());
            }
            Step::DropColumns { columns }
            | Step::RequirePresent { columns }
            | Step::Scale { columns, .. }
                if columns.is_empty() =>
            {
                return Err("column list is empty".to_string());
            }
            Step::Impute { fills } if fills.is_empty() => {
                return Err("fill mapping is empty".to_string());
            }
            Step::ExcludeContaining { needle, .. } if needle.is_empty() => {
                return Err("needle is empty".to_string());
            }
            Step::EncodeOrdinal {
                categories: Some(categories),
                ..
            }
            | Step::EncodeOneHot {
                categories: Some(categories),
                ..
            } => {
                if categories.is_empty() {
                    return Err("declared category list is empty".to_string());
                }
                if let Some(duplicate) = first_duplicate(categories) {
                    return Err(format!("category {:?} is declared twice", duplicate));
                }
            }
            Step::Clip { lower, upper, .. }
                if lower.is_nan() || upper.is_nan() || lower > upper =>
            {
                return Err(format!("lower bound {} exceeds upper bound {}", lower, upper));
            }
            Step::RemoveOutliers {
                lower_percentile,
                upper_percentile,
                ..
            } => {
                if !(0.0..=100.0).contains(lower_percentile)
                    || !(0.0..=100.0).contains(upper_percentile)
                {
                    return Err("percentiles must be between 0 and 100".to_string());
                }
                if lower_percentile >= upper_percentile {
                    return Err(format!(
                        "lower percentile {} must be below upper percentile {}",
                        lower_percentile, upper_percentile
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// First value that appears more than once, in list order.
pub(crate) fn first_duplicate(values: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .find(|v| !seen.insert(v.as_str()))
        .map(String::as_str)
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Ordered list of pipeline steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub steps: Vec<Step>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::philadelphia()
    }
}

impl Manifest {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Load a manifest from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check step parameters and that at most one checkpoint is declared.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidManifest(
                "manifest has no steps".to_string(),
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|reason| {
                PipelineError::InvalidManifest(format!(
                    "step {} ({}): {}",
                    index + 1,
                    step.action(),
                    reason
                ))
            })?;
        }

        let checkpoints = self
            .steps
            .iter()
            .filter(|s| matches!(s, Step::Checkpoint))
            .count();
        if checkpoints > 1 {
            return Err(PipelineError::InvalidManifest(format!(
                "{} checkpoint steps declared, at most one is allowed",
                checkpoints
            )));
        }

        Ok(())
    }

    /// The steps that only remove rows, in manifest order.
    pub fn row_filters(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|s| s.is_row_filter())
            .cloned()
            .collect()
    }

    /// The built-in manifest for the Philadelphia Office of Property
    /// Assessment export.
    pub fn philadelphia() -> Self {
        crate::defaults::philadelphia_steps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_json_uses_action_tag() {
        let step = Step::filter_category("category_code_description", ["SINGLE FAMILY"]);
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains(r#""action":"filter_category""#));

        let back: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_step_defaults_from_json() {
        let json = r#"[
            {"action": "prune_columns", "exempt": ["lat", "lng"]},
            {"action": "filter_year_before", "column": "sale_date"},
            {"action": "remove_outliers", "column": "depth"},
            {"action": "scale", "columns": ["depth_capped"]}
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();

        assert_eq!(
            steps[0],
            Step::PruneColumns {
                min_present_fraction: 0.25,
                max_distinct: 116_000,
                exempt: vec!["lat".to_string(), "lng".to_string()],
            }
        );
        assert_eq!(
            steps[1],
            Step::FilterYearBefore {
                column: "sale_date".to_string(),
                cutoff_year: 2024,
                drop_column: true,
            }
        );
        assert_eq!(steps[2], Step::remove_outliers("depth"));
        assert_eq!(
            steps[3],
            Step::Scale {
                columns: vec!["depth_capped".to_string()],
                on_zero_variance: ZeroVariancePolicy::Fail,
            }
        );
    }

    #[test]
    fn test_validate_rejects_inverted_percentiles() {
        let manifest = Manifest::new(vec![Step::RemoveOutliers {
            column: "depth".to_string(),
            lower_percentile: 95.0,
            upper_percentile: 5.0,
        }]);
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidManifest(_)));
        assert!(err.to_string().contains("step 1 (remove_outliers)"));
    }

    #[test]
    fn test_validate_rejects_duplicate_categories() {
        let manifest = Manifest::new(vec![Step::EncodeOrdinal {
            column: "exterior_condition".to_string(),
            categories: Some(strings(["1", "2", "3", "2"])),
            output: None,
            exclude_codes: vec![],
        }]);
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidManifest(_)));
        assert!(err.to_string().contains(r#"category "2" is declared twice"#));

        let manifest = Manifest::new(vec![Step::EncodeOneHot {
            column: "view_type".to_string(),
            categories: Some(strings(["A", "B", "A"])),
        }]);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_two_checkpoints() {
        let manifest = Manifest::new(vec![Step::Checkpoint, Step::Checkpoint]);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_manifest() {
        assert!(Manifest::new(vec![]).validate().is_err());
    }

    #[test]
    fn test_row_filters_selects_only_filters() {
        let manifest = Manifest::new(vec![
            Step::drop_columns(["a"]),
            Step::require_present(["b"]),
            Step::filter_domain("c", ["A"]),
            Step::Checkpoint,
        ]);
        let filters = manifest.row_filters();
        assert_eq!(filters.len(), 2);
        assert!(filters.iter().all(Step::is_row_filter));
    }

    #[test]
    fn test_manifest_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = Manifest::philadelphia();
        std::fs::write(&path, manifest.to_json_pretty().unwrap()).unwrap();

        let loaded = Manifest::from_json_file(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
