//! Parcel Feature Pipeline Library
//!
//! A deterministic data-cleaning and feature-engineering library for
//! municipal property-assessment exports, built with Rust and Polars.
//!
//! # Overview
//!
//! The pipeline turns a raw assessment table into two model-ready artifacts:
//!
//! - **Checkpoint**: the table after filtering, imputation, encoding and
//!   outlier removal, before scaling
//! - **Scaled**: the same rows with the numeric features standardized
//!
//! Every stage is driven by an ordered [`Manifest`] of steps: column pruning,
//! category and domain filters, sentinel imputation, completeness and
//! temporal filters, ordinal/one-hot/binary encoding, winsorized IQR outlier
//! removal and z-score scaling. The built-in manifest covers the
//! Philadelphia Office of Property Assessment export.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parcel_processing::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .output_dir("data")
//!     .min_correlation(0.4)
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process_csv("data/opa_properties_public.csv")?;
//!
//! println!("Checkpoint shape: {:?}", result.summary.checkpoint_shape);
//! println!("Scaled rows: {}", result.scaled.height());
//! ```
//!
//! # Custom Manifests
//!
//! A manifest is plain JSON, so the built-in steps can be printed, edited and
//! loaded back:
//!
//! ```rust,ignore
//! use parcel_processing::{Manifest, PipelineConfig};
//!
//! let manifest = Manifest::from_json_file("manifests/two_family.json")?;
//! let config = PipelineConfig::builder().manifest(manifest).build()?;
//! ```
//!
//! # Errors
//!
//! Schema drift (a missing column), malformed dates, unknown categories and
//! zero-variance scaling stop the run with a [`PipelineError`] that names the
//! failing step and column. Rows that fail a validity rule are not errors;
//! they are removed and counted in the run summary.

pub mod cleaner;
pub mod config;
pub mod defaults;
pub mod encoders;
pub mod error;
pub mod imputers;
pub mod manifest;
pub mod pipeline;
pub mod reduction;
pub mod reporting;
pub mod scaling;
pub mod selection;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{ColumnDropper, ColumnPruner, RowFilter};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use encoders::{
    BinaryEncoder, ClipEncoder, Encoder, FittedEncoder, OneHotEncoder, OrdinalEncoder,
};
pub use error::{PipelineError, Result, ResultExt};
pub use imputers::SentinelImputer;
pub use manifest::{Manifest, Step, ZeroVariancePolicy};
pub use pipeline::{
    ClosureProgressReporter, ExecutionOutput, OutlierBounds, OutlierRemover, Pipeline,
    PipelineBuilder, PreprocessingExecutor, PreprocessingStage, ProgressReporter, ProgressUpdate,
};
pub use reduction::{DEFAULT_PCA_COMPONENTS, PcaReducer, PcaSummary, PrincipalComponent};
pub use reporting::{ReportGenerator, RunReport};
pub use scaling::{ColumnScale, StandardScaler};
pub use selection::{FeatureCorrelation, HighCorrelationSelector};
pub use types::{
    ActionType, PipelineResult, PreprocessingAction, PreprocessingSummary, StepReport,
};
pub use utils::{ROW_INDEX, load_csv};
