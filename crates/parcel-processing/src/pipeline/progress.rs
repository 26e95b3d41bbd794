//! Progress reporting for the feature pipeline.
//!
//! The pipeline runs synchronously and reports one update per manifest step,
//! plus a terminal update on completion or failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_processing::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(df)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the feature pipeline.
///
/// Every manifest step maps to one stage (see [`crate::manifest::Step::stage`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingStage {
    /// Reading the raw table
    Loading,
    /// Missingness and cardinality column pruning
    Pruning,
    /// Row filters (category, placeholder, completeness, temporal, domain)
    Filtering,
    /// Strict column drops
    Dropping,
    /// Sentinel imputation
    Imputation,
    /// Ordinal, one-hot, binary and clip encoding
    Encoding,
    /// Winsorized IQR outlier removal
    OutlierRemoval,
    /// Capturing the checkpoint table
    Checkpoint,
    /// Standardization
    Scaling,
    /// Principal component projection
    Reduction,
    /// Writing artifacts and the run report
    Writing,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PreprocessingStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Data",
            Self::Pruning => "Pruning Columns",
            Self::Filtering => "Filtering Rows",
            Self::Dropping => "Dropping Columns",
            Self::Imputation => "Imputing Values",
            Self::Encoding => "Encoding Features",
            Self::OutlierRemoval => "Removing Outliers",
            Self::Checkpoint => "Checkpoint",
            Self::Scaling => "Scaling Features",
            Self::Reduction => "Reducing Dimensions",
            Self::Writing => "Writing Artifacts",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// Progress update emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PreprocessingStage,

    /// Optional sub-stage description (e.g., "encode_binary: zoning")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of steps processed so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Total number of steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update without sub-stage info.
    pub fn new(stage: PreprocessingStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a progress update for step `current` of `total`.
    pub fn with_items(
        stage: PreprocessingStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            sub_stage: Some(sub_stage.into()),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PreprocessingStage::Complete, 1.0, message)
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PreprocessingStage::Failed, 0.0, message)
    }
}

/// Trait for receiving progress updates from the pipeline.
pub trait ProgressReporter: Send + Sync {
    /// Called once per step and once at the end of a run.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PreprocessingStage::Loading, 0.0, "Loading...");
        assert_eq!(update.stage, PreprocessingStage::Loading);
        assert!(update.sub_stage.is_none());
        assert_eq!(update.message, "Loading...");
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            PreprocessingStage::Encoding,
            "encode_binary: zoning",
            5,
            10,
            "Binary encoding zoning",
        );
        assert_eq!(update.stage, PreprocessingStage::Encoding);
        assert_eq!(update.sub_stage, Some("encode_binary: zoning".to_string()));
        assert_eq!(update.progress, 0.5);
        assert_eq!(update.items_processed, Some(5));
        assert_eq!(update.items_total, Some(10));
    }

    #[test]
    fn test_progress_update_clamps() {
        let update = ProgressUpdate::new(PreprocessingStage::Scaling, 1.7, "over");
        assert_eq!(update.progress, 1.0);
        assert_eq!(ProgressUpdate::complete("Done").progress, 1.0);
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PreprocessingStage::Pruning, 0.1, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&PreprocessingStage::OutlierRemoval).unwrap();
        assert_eq!(json, "\"outlier_removal\"");
    }
}
