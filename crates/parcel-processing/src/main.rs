//! CLI entry point for the parcel feature pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use parcel_processing::reporting::{RunReport, pca_file_name};
use parcel_processing::{
    Manifest, Pipeline, PipelineConfig, PipelineResult, ReportGenerator, load_csv,
};
use serde_json::json;
use std::path::Path;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Feature pipeline for property-assessment datasets",
    long_about = "Cleans, encodes and scales a property-assessment CSV export into a \
                  checkpoint table and a scaled table.\n\n\
                  EXAMPLES:\n  \
                  # Run the built-in Philadelphia manifest\n  \
                  parcel-processing -i opa_properties_public.csv -o data/\n\n  \
                  # Preview the steps without running them\n  \
                  parcel-processing -i opa_properties_public.csv --dry-run\n\n  \
                  # Edit the manifest and run it\n  \
                  parcel-processing --print-manifest > manifest.json\n  \
                  parcel-processing -i opa_properties_public.csv --manifest manifest.json"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long, required_unless_present = "print_manifest")]
    input: Option<String>,

    /// Output directory for the artifacts
    #[arg(short, long, default_value = "output")]
    output: String,

    /// JSON manifest to run instead of the built-in one
    #[arg(long)]
    manifest: Option<String>,

    /// Print the active manifest as JSON and exit
    #[arg(long)]
    print_manifest: bool,

    /// Load the input and show the steps without running them
    #[arg(long)]
    dry_run: bool,

    /// File name of the checkpoint artifact (without extension)
    #[arg(long, default_value = "filtered")]
    checkpoint_name: String,

    /// File name of the scaled artifact (without extension)
    #[arg(long, default_value = "scaled")]
    scaled_name: String,

    /// Target column for the correlation ranking
    #[arg(short, long)]
    target: Option<String>,

    /// Also write high_correlations.csv with features whose |r| with the
    /// target is at least this value
    #[arg(long)]
    min_correlation: Option<f64>,

    /// Also write pca_<N>component.csv with the scaled features projected
    /// onto this many principal components
    #[arg(long)]
    pca_components: Option<usize>,

    /// Write pipeline_report.json to the output directory
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Rows scanned to infer column types (0, the default, scans the whole file)
    #[arg(long, default_value_t = 0)]
    infer_schema_length: usize,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let manifest = match &args.manifest {
        Some(path) => {
            info!("Loading manifest from: {}", path);
            Manifest::from_json_file(path)?
        }
        None => Manifest::philadelphia(),
    };

    if args.print_manifest {
        println!("{}", manifest.to_json_pretty()?);
        return Ok(());
    }

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("--input is required"))?;
    if !Path::new(&input).exists() {
        return Err(anyhow!("Input file not found: {}", input));
    }

    let infer_schema_length = match args.infer_schema_length {
        0 => None,
        rows => Some(rows),
    };

    if args.dry_run {
        return run_dry_run(&args, &input, &manifest, infer_schema_length);
    }

    let mut config_builder = PipelineConfig::builder()
        .output_dir(&args.output)
        .checkpoint_name(&args.checkpoint_name)
        .scaled_name(&args.scaled_name)
        .generate_reports(args.emit_report)
        .infer_schema_length(infer_schema_length)
        .manifest(manifest);

    if let Some(ref target) = args.target {
        config_builder = config_builder.target_column(target);
    }
    if let Some(threshold) = args.min_correlation {
        config_builder = config_builder.min_correlation(threshold);
    }
    if let Some(components) = args.pca_components {
        config_builder = config_builder.pca_components(components);
    }

    let config = config_builder.build()?;

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    match pipeline.process_csv(&input) {
        Ok(result) => handle_pipeline_output(&result, &input, &args),
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&json!({ "error": e }))?);
            }
            error!("Pipeline failed: {}", e);
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

/// Run dry-run mode: show the input shape and the steps without running them.
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_dry_run(
    args: &Args,
    input: &str,
    manifest: &Manifest,
    infer_schema_length: Option<usize>,
) -> Result<()> {
    let data = load_csv(input, infer_schema_length)?;

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of pipeline steps");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input);
    println!("  Rows: {}", data.height());
    println!("  Columns: {}", data.width());
    println!();

    println!("MANIFEST STEPS");
    println!("{}", "-".repeat(40));
    println!("{:<4} {:<22} {:<18} {}", "#", "Action", "Stage", "Columns");
    println!("{}", "-".repeat(80));
    for (position, step) in manifest.steps.iter().enumerate() {
        let columns = step.columns();
        println!(
            "{:<4} {:<22} {:<18} {}",
            position + 1,
            step.action(),
            step.stage().display_name(),
            truncate_str(&columns.join(", "), 60)
        );
    }
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}/{}.csv", args.output, args.checkpoint_name);
    println!("  - {}/{}.csv", args.output, args.scaled_name);
    if args.min_correlation.is_some() {
        println!("  - {}/high_correlations.csv", args.output);
    }
    if let Some(components) = args.pca_components {
        println!("  - {}/{}.csv", args.output, pca_file_name(components));
    }
    if args.emit_report {
        println!("  - {}/pipeline_report.json", args.output);
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute this pipeline, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Handle pipeline output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
fn handle_pipeline_output(result: &PipelineResult, input: &str, args: &Args) -> Result<()> {
    let report = ReportGenerator::build_report(Some(input), result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report);
    Ok(())
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(report: &RunReport) {
    let summary = &report.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("PIPELINE COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        report.input_file.as_deref().unwrap_or("-"),
        summary.rows_before,
        summary.columns_before
    );
    if let Some((rows, columns)) = summary.checkpoint_shape {
        println!("Checkpoint: {} rows x {} columns", rows, columns);
    }
    println!(
        "Scaled: {} rows x {} columns",
        report.final_shape.0, report.final_shape.1
    );
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed, {:.1}%)",
        summary.rows_before,
        summary.rows_after,
        summary.rows_removed,
        summary.rows_removed_percentage()
    );
    for loss in &report.rows_removed_by_stage {
        println!(
            "    {:<16} {:>8}",
            loss.stage.display_name(),
            loss.rows_removed
        );
    }
    println!();

    if !summary.correlations.is_empty() {
        println!("Strongest correlations:");
        for feature in summary.correlations.iter().take(5) {
            println!("  {:<32} {:>7.3}", feature.column, feature.correlation);
        }
        println!();
    }

    if let Some(pca) = &summary.pca {
        println!(
            "Principal components: {} of {} features, {:.1}% of variance",
            pca.components.len(),
            pca.features.len(),
            pca.explained_variance() * 100.0
        );
        println!();
    }

    if !report.artifacts.is_empty() {
        println!("Artifacts:");
        for artifact in &report.artifacts {
            println!("  - {}", artifact);
        }
        println!();
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
}
