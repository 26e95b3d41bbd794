//! Main feature pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating a manifest run from raw table to written artifacts.

use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::PreprocessingExecutor;
use crate::pipeline::progress::{
    ClosureProgressReporter, PreprocessingStage, ProgressReporter, ProgressUpdate,
};
use crate::reduction::PcaReducer;
use crate::reporting::{HIGH_CORRELATION_FILE_NAME, ReportGenerator, pca_file_name};
use crate::scaling::ColumnScale;
use crate::selection::HighCorrelationSelector;
use crate::types::{
    ActionType, HIGH_ROW_LOSS_PERCENT, PipelineResult, PreprocessingAction, PreprocessingSummary,
};
use crate::utils::{ROW_INDEX, feature_columns, load_csv};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The main feature pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use parcel_processing::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .config(PipelineConfig::builder().output_dir("data").build()?)
///     .build()?
///     .process_csv("data/opa_properties_public.csv")?;
///
/// println!("{} rows scaled", result.scaled.height());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    executor: PreprocessingExecutor,
    reporter: ReportGenerator,
}

// Ensure Pipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a CSV file and run it through the pipeline.
    ///
    /// The input path is recorded in the run report.
    pub fn process_csv(&self, path: impl AsRef<Path>) -> Result<PipelineResult> {
        let path = path.as_ref();
        self.report_progress(ProgressUpdate::new(
            PreprocessingStage::Loading,
            0.0,
            format!("Loading {}", path.display()),
        ));

        let loaded = load_csv(path, self.config.infer_schema_length);
        let input = path.display().to_string();
        self.finish(loaded.and_then(|df| self.process_internal(df, Some(&input))))
    }

    /// Process a DataFrame through the pipeline.
    ///
    /// Returns a `PipelineResult` containing the checkpoint and scaled tables
    /// together with the run summary.
    ///
    /// # Errors
    ///
    /// The first failing step stops the run. Its error is wrapped with the
    /// step position and action, so the message names the stage and the
    /// column at fault.
    pub fn process(&self, df: DataFrame) -> Result<PipelineResult> {
        self.finish(self.process_internal(df, None))
    }

    fn finish(&self, outcome: Result<PipelineResult>) -> Result<PipelineResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn process_internal(&self, df: DataFrame, input: Option<&str>) -> Result<PipelineResult> {
        let start_time = Instant::now();

        info!("Starting feature pipeline...");
        let df = attach_row_index(df)?;

        let mut summary = PreprocessingSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = feature_columns(&df).len();
        info!(
            "Raw table: {} rows, {} columns",
            summary.rows_before, summary.columns_before
        );

        let output = self.executor.execute(
            df,
            &self.config.manifest,
            self.progress_reporter.as_deref(),
        )?;

        let scaled = output.table;
        summary.rows_after = scaled.height();
        summary.rows_removed = summary.rows_before.saturating_sub(summary.rows_after);
        summary.columns_after = feature_columns(&scaled).len();
        summary.checkpoint_shape = output
            .checkpoint
            .as_ref()
            .map(|c| (c.height(), feature_columns(c).len()));
        summary.steps = output.steps;
        summary.actions = output.actions;

        if output.checkpoint.is_none() {
            summary.add_warning("Manifest has no checkpoint step; no checkpoint table was kept");
        }

        let removed_percent = summary.rows_removed_percentage();
        if removed_percent > HIGH_ROW_LOSS_PERCENT {
            warn!("{:.1}% of rows were removed", removed_percent);
            summary.add_warning(format!(
                "High row loss: {:.1}% of rows were removed ({} of {})",
                removed_percent, summary.rows_removed, summary.rows_before
            ));
        }

        let high_correlation = self.rank_features(&scaled, &mut summary)?;
        let pca = self.project_components(&scaled, &output.scales, &mut summary)?;

        let mut result = PipelineResult {
            checkpoint: output.checkpoint,
            scaled,
            high_correlation,
            pca,
            scales: output.scales,
            outliers: output.outliers,
            artifacts: Vec::new(),
            summary,
        };

        if self.config.save_to_disk {
            self.write_artifacts(&mut result)?;
        }

        result.summary.duration_ms = start_time.elapsed().as_millis() as u64;

        if self.config.generate_reports {
            let report = ReportGenerator::build_report(input, &result);
            let path = self.reporter.write_report(&report)?;
            result.artifacts.push(path);
        }

        info!(
            "Pipeline finished in {}ms: {} -> {} rows, {} -> {} columns",
            result.summary.duration_ms,
            result.summary.rows_before,
            result.summary.rows_after,
            result.summary.columns_before,
            result.summary.columns_after
        );
        Ok(result)
    }

    /// Rank features against the target and, when a threshold is configured,
    /// build the high-correlation subset.
    fn rank_features(
        &self,
        scaled: &DataFrame,
        summary: &mut PreprocessingSummary,
    ) -> Result<Option<DataFrame>> {
        let target = &self.config.target_column;
        if scaled.get_column_index(target).is_none() {
            if self.config.min_correlation.is_some() {
                return Err(PipelineError::ColumnNotFound(target.clone()));
            }
            debug!("Target '{}' absent, skipping correlation ranking", target);
            return Ok(None);
        }

        let threshold = self.config.min_correlation.unwrap_or(0.0);
        let selector = HighCorrelationSelector::new(target.as_str(), threshold);
        summary.correlations = selector.rank(scaled)?;

        match self.config.min_correlation {
            Some(_) => {
                let (subset, selected) = selector.select(scaled)?;
                info!(
                    "{} features have |r| >= {} with '{}'",
                    selected.len(),
                    threshold,
                    target
                );
                Ok(Some(subset))
            }
            None => Ok(None),
        }
    }

    /// Project the scaled features onto principal components, when a
    /// component count is configured.
    ///
    /// The scale step's columns are projected; without a scale step every
    /// numeric feature except the target is. The target is carried along
    /// unprojected.
    fn project_components(
        &self,
        scaled: &DataFrame,
        scales: &[ColumnScale],
        summary: &mut PreprocessingSummary,
    ) -> Result<Option<DataFrame>> {
        let Some(components) = self.config.pca_components else {
            return Ok(None);
        };
        self.report_progress(ProgressUpdate::new(
            PreprocessingStage::Reduction,
            1.0,
            format!("Projecting onto {} principal components", components),
        ));

        let target = &self.config.target_column;
        let mut reducer = PcaReducer::new(components)
            .with_features(scales.iter().map(|s| s.column.clone()));
        if scaled.get_column_index(target).is_some() {
            reducer = reducer.with_passthrough(target.as_str());
        }
        let (table, pca) = reducer.apply(scaled)?;

        info!(
            "{} principal components keep {:.1}% of the feature variance",
            pca.components.len(),
            pca.explained_variance() * 100.0
        );
        summary.add_action(PreprocessingAction::new(
            ActionType::ComponentsProjected,
            "dataset",
            format!(
                "Projected {} features onto {} components",
                pca.features.len(),
                pca.components.len()
            ),
        ));
        summary.pca = Some(pca);
        Ok(Some(table))
    }

    fn write_artifacts(&self, result: &mut PipelineResult) -> Result<()> {
        self.report_progress(ProgressUpdate::new(
            PreprocessingStage::Writing,
            1.0,
            format!("Writing artifacts to {}", self.reporter.output_dir().display()),
        ));
        let label = self.config.index_label.as_str();

        if let Some(checkpoint) = &result.checkpoint {
            let path = self
                .reporter
                .write_csv(checkpoint, &self.config.checkpoint_name, label)?;
            result.artifacts.push(path);
        }

        let path = self
            .reporter
            .write_csv(&result.scaled, &self.config.scaled_name, label)?;
        result.artifacts.push(path);

        if let Some(subset) = &result.high_correlation {
            let path = self
                .reporter
                .write_csv(subset, HIGH_CORRELATION_FILE_NAME, label)?;
            result.artifacts.push(path);
        }

        if let (Some(table), Some(components)) = (&result.pca, self.config.pca_components) {
            let path = self
                .reporter
                .write_csv(table, &pca_file_name(components), label)?;
            result.artifacts.push(path);
        }

        result.summary.add_action(PreprocessingAction::new(
            ActionType::CheckpointTaken,
            "dataset",
            format!("Wrote {} artifacts", result.artifacts.len()),
        ));
        Ok(())
    }
}

/// Attach the row-label column unless the table already carries one.
fn attach_row_index(df: DataFrame) -> Result<DataFrame> {
    if df.get_column_index(ROW_INDEX).is_some() {
        return Ok(df);
    }
    Ok(df.with_row_index(ROW_INDEX.into(), None)?)
}

/// Builder for creating a [`Pipeline`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .on_progress(|update| println!("{}", update.message))
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure PipelineBuilder is Send (can be moved to another thread during construction)
static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use parcel_processing::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let reporter = ReportGenerator::new(config.output_dir.clone());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            executor: PreprocessingExecutor,
            reporter,
        })
    }
}
