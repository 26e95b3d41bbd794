//! Report generation module.
//!
//! This module writes the pipeline artifacts (checkpoint, scaled table, the
//! optional high-correlation subset and principal component table) and the
//! JSON run report.
//!
//! # Run Reports
//!
//! Use [`RunReport`] for both:
//! - JSON output to stdout (`--json` CLI flag)
//! - JSON file output (`--emit-report` CLI flag)
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_processing::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build_report(Some("data/opa_properties.csv"), &result);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let generator = ReportGenerator::new("output");
//! generator.write_report(&report)?;
//! ```

mod generator;

pub use generator::{
    HIGH_CORRELATION_FILE_NAME, REPORT_FILE_NAME, ReportGenerator, RunReport, StageRowLoss,
    pca_file_name,
};
