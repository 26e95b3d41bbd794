//! Pipeline module.
//!
//! This module provides the main feature pipeline, the manifest executor and
//! the outlier and progress components they share.

mod builder;
mod executor;
pub mod outliers;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::{ExecutionOutput, PreprocessingExecutor};
pub use outliers::{OutlierBounds, OutlierRemover};
pub use progress::{
    ClosureProgressReporter, PreprocessingStage, ProgressReporter, ProgressUpdate,
};
