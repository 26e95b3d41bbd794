use crate::pipeline::outliers::OutlierBounds;
use crate::pipeline::progress::PreprocessingStage;
use crate::reduction::PcaSummary;
use crate::scaling::ColumnScale;
use crate::selection::FeatureCorrelation;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Row loss (in percent) above which the summary carries a warning.
pub const HIGH_ROW_LOSS_PERCENT: f32 = 30.0;

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Table as it was at the checkpoint step, if the manifest has one.
    pub checkpoint: Option<DataFrame>,
    /// Table after the last step.
    pub scaled: DataFrame,
    /// High-correlation feature subset, when a threshold was configured.
    pub high_correlation: Option<DataFrame>,
    /// Principal component table, when a component count was configured.
    pub pca: Option<DataFrame>,
    /// Statistics learned by the scale step, if any.
    pub scales: Vec<ColumnScale>,
    /// Caps and fences of each outlier step, in manifest order.
    pub outliers: Vec<OutlierBounds>,
    /// Files written by the run, in write order.
    pub artifacts: Vec<PathBuf>,
    pub summary: PreprocessingSummary,
}

// ============================================================================
// Preprocessing Summary Types
// ============================================================================

/// Human-readable summary of what the pipeline did.
///
/// Serialized into `pipeline_report.json` and printed by `--json`.
///
/// # Example
///
/// ```rust,ignore
/// let summary = result.summary;
/// println!("Kept {} of {} rows in {}ms", summary.rows_after, summary.rows_before, summary.duration_ms);
/// for step in &summary.steps {
///     println!("{:>2} {:<22} {:>8} rows", step.index, step.action, step.rows_after);
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessingSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Number of rows in the raw table.
    pub rows_before: usize,
    /// Number of rows after the last step.
    pub rows_after: usize,
    /// Number of rows removed by the run.
    pub rows_removed: usize,

    /// Number of feature columns in the raw table.
    pub columns_before: usize,
    /// Number of feature columns after the last step.
    pub columns_after: usize,

    /// Shape of the checkpoint table (rows, feature columns).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_shape: Option<(usize, usize)>,

    /// Per-step accounting, in manifest order.
    pub steps: Vec<StepReport>,

    /// List of actions taken during preprocessing.
    pub actions: Vec<PreprocessingAction>,

    /// Correlation of each feature with the target, strongest first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub correlations: Vec<FeatureCorrelation>,

    /// Components learned by the principal component projection.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pca: Option<PcaSummary>,

    /// Warnings and notes generated during preprocessing.
    pub warnings: Vec<String>,
}

impl PreprocessingSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: PreprocessingAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Calculate the percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f32 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_removed as f32 / self.rows_before as f32) * 100.0
        }
    }

    /// Rows removed per stage, in first-seen stage order.
    pub fn rows_removed_by_stage(&self) -> Vec<(PreprocessingStage, usize)> {
        let mut totals: Vec<(PreprocessingStage, usize)> = Vec::new();
        for step in &self.steps {
            match totals.iter_mut().find(|(stage, _)| *stage == step.stage) {
                Some((_, total)) => *total += step.rows_removed(),
                None => totals.push((step.stage, step.rows_removed())),
            }
        }
        totals
    }
}

/// Row and column accounting of one manifest step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based position in the manifest.
    pub index: usize,
    pub action: String,
    pub stage: PreprocessingStage,
    /// Columns the step was declared on.
    pub columns: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl StepReport {
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// A single action taken during preprocessing.
///
/// Actions are logged throughout the pipeline execution to provide
/// a detailed audit trail of what was done to the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
    /// Additional details (e.g., sentinel used, fence bounds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PreprocessingAction {
    /// Create a new preprocessing action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions that can be taken during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// A column was removed from the dataset.
    ColumnRemoved,
    /// One or more rows were removed from the dataset.
    RowsRemoved,
    /// Missing values were imputed.
    ValueImputed,
    /// Categories were encoded.
    CategoriesEncoded,
    /// Outliers were capped and their rows removed.
    OutlierHandled,
    /// The checkpoint table was captured.
    CheckpointTaken,
    /// Data was normalized or scaled.
    DataNormalized,
    /// Features were projected onto principal components.
    ComponentsProjected,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ColumnRemoved => "Column Removed",
            Self::RowsRemoved => "Rows Removed",
            Self::ValueImputed => "Value Imputed",
            Self::CategoriesEncoded => "Categories Encoded",
            Self::OutlierHandled => "Outlier Handled",
            Self::CheckpointTaken => "Checkpoint Taken",
            Self::DataNormalized => "Data Normalized",
            Self::ComponentsProjected => "Components Projected",
        }
    }
}
