use crate::error::Result;
use crate::pipeline::outliers::OutlierBounds;
use crate::pipeline::progress::PreprocessingStage;
use crate::scaling::ColumnScale;
use crate::types::{PipelineResult, PreprocessingSummary};
use crate::utils::{ROW_INDEX, feature_columns};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the JSON run report.
pub const REPORT_FILE_NAME: &str = "pipeline_report.json";

/// File name of the high-correlation feature subset.
pub const HIGH_CORRELATION_FILE_NAME: &str = "high_correlations";

/// File name of the principal component table for `components` components.
pub fn pca_file_name(components: usize) -> String {
    format!("pca_{}component", components)
}

// ============================================================================
// Run Report Types
// ============================================================================

/// Report of one pipeline run, for both `--json` output and `--emit-report`.
///
/// The report is built from a [`PipelineResult`] and carries no table data,
/// only the accounting and the learned statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the input file, when the run started from a file
    pub input_file: Option<String>,
    /// Artifacts written before the report
    pub artifacts: Vec<String>,
    /// Shape of the scaled table (rows, columns)
    pub final_shape: (usize, usize),
    /// Rows removed by each stage, in manifest order
    pub rows_removed_by_stage: Vec<StageRowLoss>,
    /// Processing summary, including per-step accounting
    pub summary: PreprocessingSummary,
    /// Caps and fences of each outlier step
    pub outliers: Vec<OutlierBounds>,
    /// Mean and standard deviation learned by the scale step
    pub scales: Vec<ColumnScale>,
}

/// Rows removed by one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRowLoss {
    pub stage: PreprocessingStage,
    pub rows_removed: usize,
}

/// Writes the pipeline artifacts and the run report.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
        }
    }
}

impl ReportGenerator {
    /// Create a new ReportGenerator writing under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `df` to `<output_dir>/<name>.csv`.
    ///
    /// The row-label column, when present, is written first under
    /// `index_label`; every other column keeps its table order.
    pub fn write_csv(&self, df: &DataFrame, name: &str, index_label: &str) -> Result<PathBuf> {
        let mut out = if df.get_column_index(ROW_INDEX).is_some() {
            let mut names: Vec<PlSmallStr> = vec![ROW_INDEX.into()];
            names.extend(feature_columns(df).into_iter().map(PlSmallStr::from));
            let mut selected = df.select(names)?;
            selected.rename(ROW_INDEX, index_label.into())?;
            selected
        } else {
            df.clone()
        };

        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{}.csv", name));
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut out)?;

        info!(
            "Dataset saved: {} ({} rows, {} columns)",
            output_path.display(),
            out.height(),
            out.width()
        );
        Ok(output_path)
    }

    /// Build the run report of `result`.
    pub fn build_report(input_file: Option<&str>, result: &PipelineResult) -> RunReport {
        let rows_removed_by_stage = result
            .summary
            .rows_removed_by_stage()
            .into_iter()
            .filter(|(_, removed)| *removed > 0)
            .map(|(stage, rows_removed)| StageRowLoss {
                stage,
                rows_removed,
            })
            .collect();

        RunReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.map(str::to_string),
            artifacts: result
                .artifacts
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            final_shape: (result.scaled.height(), feature_columns(&result.scaled).len()),
            rows_removed_by_stage,
            summary: result.summary.clone(),
            outliers: result.outliers.clone(),
            scales: result.scales.clone(),
        }
    }

    /// Write `report` to `<output_dir>/pipeline_report.json`.
    pub fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self.output_dir.join(REPORT_FILE_NAME);
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        debug!("Report covers {} steps", report.summary.steps.len());
        Ok(report_path)
    }
}
