//! Preprocessing executor module.
//!
//! Interprets a [`Manifest`] one step at a time. Each step is a function of
//! the current table and the step's own parameters; the executor records
//! what every step did and wraps any failure with the step it came from.

use crate::cleaner::{ColumnDropper, ColumnPruner, RowFilter};
use crate::encoders::{
    BinaryEncoder, ClipEncoder, Encoder, FittedEncoder, OneHotEncoder, OrdinalEncoder,
};
use crate::error::{Result, ResultExt};
use crate::imputers::SentinelImputer;
use crate::manifest::{Manifest, Step};
use crate::pipeline::outliers::{OutlierBounds, OutlierRemover};
use crate::pipeline::progress::{ProgressReporter, ProgressUpdate};
use crate::scaling::{ColumnScale, StandardScaler};
use crate::types::{ActionType, PreprocessingAction, StepReport};
use crate::utils::feature_columns;
use polars::prelude::*;
use tracing::{debug, info};

/// Result of running a manifest.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Table after the last step.
    pub table: DataFrame,
    /// Table as it was when the checkpoint step ran.
    pub checkpoint: Option<DataFrame>,
    pub steps: Vec<StepReport>,
    pub actions: Vec<PreprocessingAction>,
    pub scales: Vec<ColumnScale>,
    pub outliers: Vec<OutlierBounds>,
}

/// Side results of one step, besides the new table.
#[derive(Default)]
struct StepEffects {
    actions: Vec<PreprocessingAction>,
    details: Option<String>,
    checkpoint: bool,
    scales: Vec<ColumnScale>,
    outliers: Option<OutlierBounds>,
}

/// Executes manifest steps on a DataFrame.
pub struct PreprocessingExecutor;

impl PreprocessingExecutor {
    /// Run every step of `manifest` in order.
    ///
    /// A failing step stops the run; its error is wrapped as
    /// `step <n> (<action>)` so the message names the stage and the column.
    pub fn execute(
        &self,
        mut df: DataFrame,
        manifest: &Manifest,
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<ExecutionOutput> {
        let total = manifest.steps.len();
        let mut output = ExecutionOutput {
            table: DataFrame::empty(),
            checkpoint: None,
            steps: Vec::with_capacity(total),
            actions: Vec::new(),
            scales: Vec::new(),
            outliers: Vec::new(),
        };

        for (position, step) in manifest.steps.iter().enumerate() {
            let index = position + 1;
            let columns = step.columns();
            info!(
                "Step {}/{}: {} {}",
                index,
                total,
                step.action(),
                columns.join(", ")
            );

            if let Some(reporter) = reporter {
                reporter.report(ProgressUpdate::with_items(
                    step.stage(),
                    format!("{}: {}", step.action(), columns.join(", ")),
                    position,
                    total,
                    format!("{} ({}/{})", step.stage().display_name(), index, total),
                ));
            }

            let rows_before = df.height();
            let columns_before = feature_columns(&df);

            let (next, effects) = self
                .run_step(df, step)
                .context(format!("step {} ({})", index, step.action()))?;
            df = next;

            let columns_after = feature_columns(&df);
            let report = StepReport {
                index,
                action: step.action().to_string(),
                stage: step.stage(),
                columns,
                rows_before,
                rows_after: df.height(),
                columns_added: difference(&columns_after, &columns_before),
                columns_removed: difference(&columns_before, &columns_after),
                details: effects.details,
            };
            debug!(
                "Step {} kept {}/{} rows, {} columns",
                index,
                report.rows_after,
                report.rows_before,
                columns_after.len()
            );

            if effects.checkpoint {
                output.checkpoint = Some(df.clone());
            }
            output.actions.extend(effects.actions);
            output.scales.extend(effects.scales);
            output.outliers.extend(effects.outliers);
            output.steps.push(report);
        }

        output.table = df;
        Ok(output)
    }

    /// Re-run the row filters of `manifest` over an already processed table.
    ///
    /// Filters whose columns were since encoded or dropped are skipped, and
    /// completeness checks only look at the listed columns that remain.
    /// Returns the filtered table and the number of rows removed.
    pub fn reapply_row_filters(
        &self,
        df: DataFrame,
        manifest: &Manifest,
    ) -> Result<(DataFrame, usize)> {
        let before = df.height();
        let present = feature_columns(&df);
        let mut steps = Vec::new();

        for step in manifest.row_filters() {
            match step {
                Step::RequirePresent { columns } => {
                    let remaining: Vec<String> = columns
                        .into_iter()
                        .filter(|c| present.contains(c))
                        .collect();
                    if !remaining.is_empty() {
                        steps.push(Step::RequirePresent { columns: remaining });
                    }
                }
                other => {
                    if other.columns().iter().all(|c| present.contains(c)) {
                        steps.push(other);
                    } else {
                        debug!("Skipping {} on a column no longer present", other.action());
                    }
                }
            }
        }

        if steps.is_empty() {
            return Ok((df, 0));
        }
        let output = self.execute(df, &Manifest::new(steps), None)?;
        let removed = before - output.table.height();
        Ok((output.table, removed))
    }

    fn run_step(&self, df: DataFrame, step: &Step) -> Result<(DataFrame, StepEffects)> {
        let mut effects = StepEffects::default();
        let rows_before = df.height();

        let df = match step {
            Step::PruneColumns {
                min_present_fraction,
                max_distinct,
                exempt,
            } => {
                let pruner = ColumnPruner::new(*min_present_fraction, *max_distinct, exempt.clone());
                let (df, outcome) = pruner.prune(df)?;
                for column in &outcome.sparse {
                    effects.actions.push(PreprocessingAction::new(
                        ActionType::ColumnRemoved,
                        column,
                        format!(
                            "Removed column with less than {:.0}% of values present",
                            min_present_fraction * 100.0
                        ),
                    ));
                }
                for column in &outcome.high_cardinality {
                    effects.actions.push(PreprocessingAction::new(
                        ActionType::ColumnRemoved,
                        column,
                        format!("Removed column with more than {} distinct values", max_distinct),
                    ));
                }
                effects.details = Some(format!(
                    "{} sparse, {} high-cardinality",
                    outcome.sparse.len(),
                    outcome.high_cardinality.len()
                ));
                df
            }
            Step::DropColumns { columns } => {
                let df = ColumnDropper::drop_columns(df, columns)?;
                for column in columns {
                    effects.actions.push(PreprocessingAction::new(
                        ActionType::ColumnRemoved,
                        column,
                        "Dropped column",
                    ));
                }
                df
            }
            Step::FilterCategory { column, accepted } => {
                RowFilter::filter_category(&df, column, accepted)?
            }
            Step::ExcludeContaining { column, needle } => {
                RowFilter::exclude_containing(&df, column, needle)?
            }
            Step::RequireGreaterThan { column, bound } => {
                RowFilter::require_greater_than(&df, column, *bound)?
            }
            Step::RequirePresent { columns } => RowFilter::require_present(&df, columns)?,
            Step::FilterDomain { column, valid } => RowFilter::filter_domain(&df, column, valid)?,
            Step::FilterYearBefore {
                column,
                cutoff_year,
                drop_column,
            } => {
                let df = RowFilter::filter_year_before(&df, column, *cutoff_year, *drop_column)?;
                if *drop_column {
                    effects.actions.push(PreprocessingAction::new(
                        ActionType::ColumnRemoved,
                        column,
                        "Dropped date column after the temporal cutoff",
                    ));
                }
                effects.details = Some(format!("year < {}", cutoff_year));
                df
            }
            Step::Impute { fills } => {
                let (df, counts) = SentinelImputer::new(fills.clone()).impute(df)?;
                for (column, filled) in counts.iter().filter(|(_, n)| **n > 0) {
                    let sentinel = fills.get(column).map(String::as_str).unwrap_or_default();
                    effects.actions.push(
                        PreprocessingAction::new(
                            ActionType::ValueImputed,
                            column,
                            format!("Filled {} missing values", filled),
                        )
                        .with_details(format!("sentinel {:?}", sentinel)),
                    );
                }
                df
            }
            Step::EncodeOrdinal {
                column,
                categories,
                output,
                exclude_codes,
            } => {
                let encoder = OrdinalEncoder {
                    column: column.clone(),
                    categories: categories.clone(),
                    output: output.clone(),
                    exclude_codes: exclude_codes.clone(),
                };
                let (df, fitted) = encoder.fit_transform(df)?;
                effects.details = Some(format!("order {:?}", fitted.categories()));
                self.record_encoding(&mut effects, &fitted, "ordinal");
                df
            }
            Step::EncodeOneHot { column, categories } => {
                let encoder = OneHotEncoder {
                    column: column.clone(),
                    categories: categories.clone(),
                };
                let (df, fitted) = encoder.fit_transform(df)?;
                self.record_encoding(&mut effects, &fitted, "one-hot");
                df
            }
            Step::EncodeBinary { column } => {
                let (df, fitted) = BinaryEncoder::new(column.clone()).fit_transform(df)?;
                effects.details = Some(format!(
                    "{} categories in {} digits",
                    fitted.category_count(),
                    fitted.width()
                ));
                self.record_encoding(&mut effects, &fitted, "binary");
                df
            }
            Step::Clip {
                column,
                lower,
                upper,
                output,
            } => {
                let encoder = ClipEncoder {
                    column: column.clone(),
                    lower: *lower,
                    upper: *upper,
                    output: output.clone(),
                };
                let (df, fitted) = encoder.fit_transform(df)?;
                self.record_encoding(&mut effects, &fitted, "clip");
                df
            }
            Step::RemoveOutliers {
                column,
                lower_percentile,
                upper_percentile,
            } => {
                let remover = OutlierRemover::new(column.clone(), *lower_percentile, *upper_percentile);
                let (df, bounds) = remover.apply(df)?;
                effects.actions.push(
                    PreprocessingAction::new(
                        ActionType::OutlierHandled,
                        column,
                        format!(
                            "Removed {} rows outside the winsorized IQR fence",
                            bounds.rows_removed
                        ),
                    )
                    .with_details(format!(
                        "caps [{:.3}, {:.3}], fence [{:.3}, {:.3}]",
                        bounds.cap_low, bounds.cap_high, bounds.fence_low, bounds.fence_high
                    )),
                );
                effects.details = Some(format!(
                    "fence [{:.3}, {:.3}]",
                    bounds.fence_low, bounds.fence_high
                ));
                effects.outliers = Some(bounds);
                df
            }
            Step::Checkpoint => {
                effects.checkpoint = true;
                effects.actions.push(PreprocessingAction::new(
                    ActionType::CheckpointTaken,
                    "dataset",
                    format!("Captured {} rows x {} columns", df.height(), feature_columns(&df).len()),
                ));
                df
            }
            Step::Scale {
                columns,
                on_zero_variance,
            } => {
                let scaler = StandardScaler {
                    columns: columns.clone(),
                    on_zero_variance: *on_zero_variance,
                };
                let fitted = scaler.fit(&df)?;
                let df = fitted.transform(&df)?;
                effects.actions.push(PreprocessingAction::new(
                    ActionType::DataNormalized,
                    "dataset",
                    format!("Standardized {} columns", columns.len()),
                ));
                effects.scales = fitted.scales().to_vec();
                df
            }
        };

        if step.is_row_filter() || matches!(step, Step::FilterYearBefore { .. }) {
            let removed = rows_before - df.height();
            if removed > 0 {
                effects.actions.push(PreprocessingAction::new(
                    ActionType::RowsRemoved,
                    step.columns().join(", "),
                    format!("Removed {} rows ({})", removed, step.action()),
                ));
            }
        }

        Ok((df, effects))
    }

    fn record_encoding<F: FittedEncoder>(&self, effects: &mut StepEffects, fitted: &F, kind: &str) {
        let outputs = fitted.output_columns();
        effects.actions.push(
            PreprocessingAction::new(
                ActionType::CategoriesEncoded,
                fitted.source_column(),
                format!("{} encoded into {} columns", kind, outputs.len()),
            )
            .with_details(outputs.join(", ")),
        );
    }
}

/// Names in `a` that are not in `b`, in `a`'s order.
fn difference(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|name| !b.contains(name)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ZeroVariancePolicy;
    use crate::pipeline::progress::ClosureProgressReporter;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn sample() -> DataFrame {
        df![
            "category_code_description" => ["SINGLE FAMILY", "SINGLE FAMILY", "MULTI FAMILY", "SINGLE FAMILY", "SINGLE FAMILY"],
            "basements" => [None, Some("A"), Some("C"), Some("D"), Some("A")],
            "sale_date" => ["2019-05-01", "2021-07-12", "2020-01-01", "2024-02-02", "2018-03-03"],
            "depth" => [80.0, 90.0, 100.0, 95.0, 85.0],
            "street_code" => [1, 2, 3, 4, 5],
        ]
        .unwrap()
    }

    #[test]
    fn test_execute_runs_steps_in_order() {
        let manifest = Manifest::new(vec![
            Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
            Step::drop_columns(["street_code", "category_code_description"]),
            Step::Impute {
                fills: BTreeMap::from([("basements".to_string(), "K".to_string())]),
            },
            Step::FilterYearBefore {
                column: "sale_date".to_string(),
                cutoff_year: 2024,
                drop_column: true,
            },
            Step::Checkpoint,
            Step::Scale {
                columns: vec!["depth".to_string()],
                on_zero_variance: ZeroVariancePolicy::Fail,
            },
        ]);

        let output = PreprocessingExecutor.execute(sample(), &manifest, None).unwrap();

        assert_eq!(output.table.height(), 3);
        let names: Vec<String> = feature_columns(&output.table);
        assert_eq!(names, vec!["depth", "basements"]);

        let checkpoint = output.checkpoint.unwrap();
        let names: Vec<String> = feature_columns(&checkpoint);
        assert_eq!(names, vec!["basements", "depth"]);

        assert_eq!(output.steps.len(), 6);
        assert_eq!(output.steps[0].rows_removed(), 1);
        assert_eq!(
            output.steps[1].columns_removed,
            vec!["category_code_description".to_string(), "street_code".to_string()]
        );
        assert_eq!(output.steps[3].columns_removed, vec!["sale_date".to_string()]);
        assert_eq!(output.scales.len(), 1);
    }

    #[test]
    fn test_error_names_step_and_column() {
        let manifest = Manifest::new(vec![
            Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
            Step::drop_columns(["building_code"]),
        ]);
        let err = PreprocessingExecutor
            .execute(sample(), &manifest, None)
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("step 2 (drop_columns)"), "{}", message);
        assert!(message.contains("building_code"), "{}", message);
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_progress_reported_per_step() {
        let seen = Mutex::new(Vec::new());
        let reporter = ClosureProgressReporter::new(|update: ProgressUpdate| {
            seen.lock().unwrap().push(update.items_processed);
        });
        let manifest = Manifest::new(vec![
            Step::drop_columns(["street_code"]),
            Step::remove_outliers("depth"),
        ]);

        PreprocessingExecutor
            .execute(sample(), &manifest, Some(&reporter as &dyn ProgressReporter))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_reapply_row_filters_skips_missing_columns() {
        let manifest = Manifest::new(vec![
            Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
            Step::drop_columns(["category_code_description"]),
            Step::require_present(["basements"]),
        ]);
        let output = PreprocessingExecutor.execute(sample(), &manifest, None).unwrap();
        assert_eq!(output.table.height(), 3);

        let later = Manifest::new(vec![
            Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
            Step::require_present(["basements", "zoning"]),
        ]);
        let (again, removed) = PreprocessingExecutor
            .reapply_row_filters(output.table.clone(), &later)
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(again.height(), output.table.height());
    }
}
