//! Configuration types for the feature pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. What the pipeline does lives in
//! the [`Manifest`]; the configuration covers where and how results are
//! written.

use crate::defaults::TARGET_COLUMN;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the feature pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use parcel_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .output_dir("data")
///     .min_correlation(0.4)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Output directory for the artifacts and the run report.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// File name (without extension) of the checkpoint artifact.
    /// Default: "filtered"
    pub checkpoint_name: String,

    /// File name (without extension) of the scaled artifact.
    /// Default: "scaled"
    pub scaled_name: String,

    /// Header label written above the index column.
    /// Default: "" (empty)
    pub index_label: String,

    /// Whether to write artifacts to disk.
    /// When false, results are kept in memory only.
    /// Default: true
    pub save_to_disk: bool,

    /// Whether to write `pipeline_report.json` next to the artifacts.
    /// Default: true
    pub generate_reports: bool,

    /// Rows scanned by the CSV reader to infer column types.
    /// `None` scans the whole file, so a text value late in a numeric
    /// looking column still makes it a text column.
    /// Default: None
    pub infer_schema_length: Option<usize>,

    /// Regression target, used for the correlation ranking.
    /// Default: "market_value_capped"
    pub target_column: String,

    /// When set, the high-correlation feature subset is built with this
    /// minimum absolute correlation.
    /// Default: None
    pub min_correlation: Option<f64>,

    /// When set, the scaled features are projected onto this many principal
    /// components and written as `pca_<n>component.csv`.
    /// Default: None
    #[serde(default)]
    pub pca_components: Option<usize>,

    /// Steps the pipeline runs.
    /// Default: the Philadelphia OPA manifest
    #[serde(default)]
    pub manifest: Manifest,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            checkpoint_name: "filtered".to_string(),
            scaled_name: "scaled".to_string(),
            index_label: String::new(),
            save_to_disk: true,
            generate_reports: true,
            infer_schema_length: None,
            target_column: TARGET_COLUMN.to_string(),
            min_correlation: None,
            pca_components: None,
            manifest: Manifest::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(threshold) = self.min_correlation
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "min_correlation".to_string(),
                value: threshold,
            });
        }

        for (field, value) in [
            ("checkpoint_name", &self.checkpoint_name),
            ("scaled_name", &self.scaled_name),
            ("target_column", &self.target_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyName(field.to_string()));
            }
        }

        if self.checkpoint_name == self.scaled_name {
            return Err(ConfigValidationError::ArtifactNameClash(
                self.checkpoint_name.clone(),
            ));
        }

        if self.infer_schema_length == Some(0) {
            return Err(ConfigValidationError::InvalidSchemaLength);
        }

        if self.pca_components == Some(0) {
            return Err(ConfigValidationError::InvalidComponentCount);
        }

        self.manifest
            .validate()
            .map_err(|e| ConfigValidationError::InvalidManifest(e.to_string()))?;

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("'{0}' must not be empty")]
    EmptyName(String),

    #[error("Checkpoint and scaled artifacts would both be written to '{0}'")]
    ArtifactNameClash(String),

    #[error("infer_schema_length must be at least 1")]
    InvalidSchemaLength,

    #[error("pca_components must be at least 1")]
    InvalidComponentCount,

    #[error("{0}")]
    InvalidManifest(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    output_dir: Option<PathBuf>,
    checkpoint_name: Option<String>,
    scaled_name: Option<String>,
    index_label: Option<String>,
    save_to_disk: Option<bool>,
    generate_reports: Option<bool>,
    infer_schema_length: Option<Option<usize>>,
    target_column: Option<String>,
    min_correlation: Option<f64>,
    pca_components: Option<usize>,
    manifest: Option<Manifest>,
}

impl PipelineConfigBuilder {
    /// Set the output directory for artifacts and reports.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the checkpoint artifact name (without extension).
    pub fn checkpoint_name(mut self, name: impl Into<String>) -> Self {
        self.checkpoint_name = Some(name.into());
        self
    }

    /// Set the scaled artifact name (without extension).
    pub fn scaled_name(mut self, name: impl Into<String>) -> Self {
        self.scaled_name = Some(name.into());
        self
    }

    pub fn index_label(mut self, label: impl Into<String>) -> Self {
        self.index_label = Some(label.into());
        self
    }

    /// Enable or disable writing artifacts to disk.
    ///
    /// When false, the pipeline keeps results in memory only and skips
    /// all file I/O.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Enable or disable the JSON run report.
    pub fn generate_reports(mut self, generate: bool) -> Self {
        self.generate_reports = Some(generate);
        self
    }

    /// Set how many rows the CSV reader scans for types (`None` = all).
    pub fn infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = Some(rows);
        self
    }

    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Build the high-correlation subset with this threshold.
    pub fn min_correlation(mut self, threshold: f64) -> Self {
        self.min_correlation = Some(threshold);
        self
    }

    /// Project the scaled features onto `n` principal components.
    pub fn pca_components(mut self, n: usize) -> Self {
        self.pca_components = Some(n);
        self
    }

    /// Replace the built-in manifest.
    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            checkpoint_name: self.checkpoint_name.unwrap_or(defaults.checkpoint_name),
            scaled_name: self.scaled_name.unwrap_or(defaults.scaled_name),
            index_label: self.index_label.unwrap_or(defaults.index_label),
            save_to_disk: self.save_to_disk.unwrap_or(defaults.save_to_disk),
            generate_reports: self.generate_reports.unwrap_or(defaults.generate_reports),
            infer_schema_length: self
                .infer_schema_length
                .unwrap_or(defaults.infer_schema_length),
            target_column: self.target_column.unwrap_or(defaults.target_column),
            min_correlation: self.min_correlation,
            pca_components: self.pca_components,
            manifest: self.manifest.unwrap_or(defaults.manifest),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Step;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.checkpoint_name, "filtered");
        assert_eq!(config.scaled_name, "scaled");
        assert_eq!(config.index_label, "");
        assert_eq!(config.target_column, "market_value_capped");
        assert!(config.min_correlation.is_none());
        assert_eq!(config.manifest, Manifest::philadelphia());
    }

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.infer_schema_length, None);
        assert!(config.save_to_disk);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .output_dir("data")
            .checkpoint_name("single_family_filtered")
            .scaled_name("single_family_scaled")
            .min_correlation(0.4)
            .infer_schema_length(Some(50_000))
            .save_to_disk(false)
            .build()
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert_eq!(config.checkpoint_name, "single_family_filtered");
        assert_eq!(config.min_correlation, Some(0.4));
        assert_eq!(config.infer_schema_length, Some(50_000));
        assert!(!config.save_to_disk);
    }

    #[test]
    fn test_validation_invalid_correlation() {
        let result = PipelineConfig::builder().min_correlation(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_rejects_zero_components() {
        let result = PipelineConfig::builder().pca_components(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidComponentCount
        ));
        let config = PipelineConfig::builder().pca_components(10).build().unwrap();
        assert_eq!(config.pca_components, Some(10));
    }

    #[test]
    fn test_validation_name_clash() {
        let result = PipelineConfig::builder()
            .checkpoint_name("out")
            .scaled_name("out")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::ArtifactNameClash(_)
        ));
    }

    #[test]
    fn test_validation_rejects_bad_manifest() {
        let result = PipelineConfig::builder()
            .manifest(Manifest::new(vec![Step::Checkpoint, Step::Checkpoint]))
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidManifest(_)
        ));
    }

    #[test]
    fn test_pipeline_config_from_json_without_manifest() {
        let json = r#"{
            "output_dir": "custom_output",
            "checkpoint_name": "filtered",
            "scaled_name": "scaled",
            "index_label": "",
            "save_to_disk": false,
            "generate_reports": false,
            "infer_schema_length": 500,
            "target_column": "market_value_capped",
            "min_correlation": 0.3
        }"#;

        let config: PipelineConfig =
            serde_json::from_str(json).expect("Should deserialize without a manifest");

        assert_eq!(config.output_dir.to_str().unwrap(), "custom_output");
        assert_eq!(config.infer_schema_length, Some(500));
        assert_eq!(config.min_correlation, Some(0.3));
        assert_eq!(config.manifest.steps.len(), Manifest::philadelphia().steps.len());
    }
}
