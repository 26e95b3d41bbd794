//! Principal component projection.
//!
//! Projects the scaled features onto their leading principal components.
//! Together with the high-correlation subset this is the second feature set
//! the downstream regression harness trains on (`pca_10component.csv`).
//!
//! Components are the top eigenvectors of the feature covariance matrix,
//! extracted one at a time by power iteration with deflation. The start
//! vector is drawn from a fixed seed and every eigenvector is oriented so its
//! largest loading is positive, so two runs over the same table agree.

use crate::error::{PipelineError, Result};
use crate::utils::{ROW_INDEX, feature_columns, is_numeric_dtype, numeric_values, require_series};
use polars::prelude::*;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of components the OPA feature set is reduced to.
pub const DEFAULT_PCA_COMPONENTS: usize = 10;

const MAX_ITERATIONS: usize = 1_000;
const TOLERANCE: f64 = 1e-10;
const SEED: u64 = 42;

/// One principal component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalComponent {
    /// Output column name (`PC1`, `PC2`, ...).
    pub name: String,
    /// Variance along the component.
    pub eigenvalue: f64,
    /// Share of the total feature variance along the component.
    pub explained_variance_ratio: f64,
    /// Weight of each input feature, aligned with [`PcaSummary::features`].
    pub loadings: Vec<f64>,
}

/// What a projection learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaSummary {
    /// Projected feature columns, in table order.
    pub features: Vec<String>,
    pub components: Vec<PrincipalComponent>,
}

impl PcaSummary {
    /// Share of the total variance kept by all components.
    pub fn explained_variance(&self) -> f64 {
        self.components
            .iter()
            .map(|c| c.explained_variance_ratio)
            .sum()
    }
}

/// Reduces numeric features to their leading principal components.
#[derive(Debug, Clone)]
pub struct PcaReducer {
    pub n_components: usize,
    /// Columns to project. Empty selects every numeric feature column
    /// except the passthrough one.
    pub features: Vec<String>,
    /// Column copied to the output unprojected, typically the target.
    pub passthrough: Option<String>,
}

impl PcaReducer {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            features: Vec::new(),
            passthrough: None,
        }
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_passthrough(mut self, column: impl Into<String>) -> Self {
        self.passthrough = Some(column.into());
        self
    }

    /// Project `df` and return the component table with what was learned.
    ///
    /// The output holds the row-label column (when present), `PC1..PCk` and
    /// the passthrough column. A missing feature value projects as the
    /// column mean.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, PcaSummary)> {
        if self.n_components == 0 {
            return Err(PipelineError::InvalidConfig(
                "PCA needs at least one component".to_string(),
            ));
        }

        let features = self.resolve_features(df)?;
        if features.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "no numeric feature columns to project".to_string(),
            ));
        }
        let rows = df.height();
        if rows < 2 {
            return Err(PipelineError::InsufficientRows {
                operation: "PCA".to_string(),
                needed: 2,
                found: rows,
            });
        }

        let centered = features
            .iter()
            .map(|name| centered_column(df, name))
            .collect::<Result<Vec<_>>>()?;

        let covariance = covariance_matrix(&centered, rows);
        let total_variance: f64 = (0..features.len()).map(|i| covariance[i][i]).sum();

        let k = self.n_components.min(features.len()).min(rows);
        if k < self.n_components {
            warn!(
                "Requested {} components but only {} are available",
                self.n_components, k
            );
        }

        let eigenpairs = leading_eigenpairs(covariance, k);
        let components: Vec<PrincipalComponent> = eigenpairs
            .into_iter()
            .enumerate()
            .map(|(i, (eigenvalue, loadings))| PrincipalComponent {
                name: format!("PC{}", i + 1),
                eigenvalue,
                explained_variance_ratio: if total_variance > 0.0 {
                    eigenvalue / total_variance
                } else {
                    0.0
                },
                loadings,
            })
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(components.len() + 2);
        if df.get_column_index(ROW_INDEX).is_some() {
            columns.push(df.column(ROW_INDEX)?.clone());
        }
        for component in &components {
            let scores: Vec<f64> = (0..rows)
                .map(|row| {
                    centered
                        .iter()
                        .zip(&component.loadings)
                        .map(|(column, weight)| column[row] * weight)
                        .sum()
                })
                .collect();
            columns.push(Column::new(component.name.as_str().into(), scores));
        }
        if let Some(passthrough) = &self.passthrough {
            require_series(df, passthrough)?;
            columns.push(df.column(passthrough)?.clone());
        }

        let summary = PcaSummary {
            features,
            components,
        };
        debug!(
            "Projected {} features onto {} components ({:.1}% of variance)",
            summary.features.len(),
            summary.components.len(),
            summary.explained_variance() * 100.0
        );
        Ok((DataFrame::new(columns)?, summary))
    }

    fn resolve_features(&self, df: &DataFrame) -> Result<Vec<String>> {
        let passthrough = self.passthrough.as_deref();
        if !self.features.is_empty() {
            return Ok(self
                .features
                .iter()
                .filter(|f| Some(f.as_str()) != passthrough)
                .cloned()
                .collect());
        }

        let mut selected = Vec::new();
        for name in feature_columns(df) {
            if Some(name.as_str()) == passthrough {
                continue;
            }
            if is_numeric_dtype(require_series(df, &name)?.dtype()) {
                selected.push(name);
            }
        }
        Ok(selected)
    }
}

/// Values minus the column mean; missing values become 0 (the mean).
fn centered_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = numeric_values(df, name)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Err(PipelineError::NoValidValues(name.to_string()));
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    Ok(values
        .into_iter()
        .map(|v| v.map_or(0.0, |x| x - mean))
        .collect())
}

/// Sample covariance of centered columns.
fn covariance_matrix(centered: &[Vec<f64>], rows: usize) -> Vec<Vec<f64>> {
    let d = centered.len();
    let denominator = (rows - 1) as f64;
    let mut covariance = vec![vec![0.0; d]; d];
    for i in 0..d {
        for j in i..d {
            let value = dot(&centered[i], &centered[j]) / denominator;
            covariance[i][j] = value;
            covariance[j][i] = value;
        }
    }
    covariance
}

/// Top `k` eigenvalues and unit eigenvectors of a symmetric PSD matrix.
fn leading_eigenpairs(mut matrix: Vec<Vec<f64>>, k: usize) -> Vec<(f64, Vec<f64>)> {
    let d = matrix.len();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut pairs = Vec::with_capacity(k);

    for _ in 0..k {
        let mut vector: Vec<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        orthogonalize(&mut vector, &pairs);
        normalize(&mut vector);
        let mut eigenvalue = 0.0;

        for _ in 0..MAX_ITERATIONS {
            let mut next: Vec<f64> = matrix.iter().map(|row| dot(row, &vector)).collect();
            eigenvalue = dot(&vector, &next);
            orthogonalize(&mut next, &pairs);
            if normalize(&mut next) < TOLERANCE {
                // the remaining spectrum is zero
                eigenvalue = 0.0;
                break;
            }
            let change: f64 = vector
                .iter()
                .zip(&next)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            vector = next;
            if change < TOLERANCE {
                break;
            }
        }

        orient(&mut vector);
        let eigenvalue = eigenvalue.max(0.0);
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell -= eigenvalue * vector[i] * vector[j];
            }
        }
        pairs.push((eigenvalue, vector));
    }

    // near-equal eigenvalues can converge out of order
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));
    pairs
}

/// Remove the components along the eigenvectors already found.
fn orthogonalize(vector: &mut [f64], found: &[(f64, Vec<f64>)]) {
    for (_, basis) in found {
        let projection = dot(vector, basis);
        vector
            .iter_mut()
            .zip(basis)
            .for_each(|(x, b)| *x -= projection * b);
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length in place; returns the length before scaling.
fn normalize(vector: &mut [f64]) -> f64 {
    let norm = dot(vector, vector).sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

/// Flip the sign so the largest loading is positive.
fn orient(vector: &mut [f64]) {
    let largest = vector
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if largest < 0.0 {
        vector.iter_mut().for_each(|x| *x = -*x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    fn scores(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name).unwrap().f64().unwrap().into_no_null_iter().collect()
    }

    #[test]
    fn test_collinear_features_load_on_first_component() {
        let df = df![
            "depth" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "frontage" => [2.0, 4.0, 6.0, 8.0, 10.0],
        ]
        .unwrap();

        let (out, summary) = PcaReducer::new(2).apply(&df).unwrap();

        assert_eq!(column_names(&out), vec!["PC1", "PC2"]);
        assert!(summary.components[0].explained_variance_ratio > 0.999);
        assert!(summary.components[1].eigenvalue.abs() < 1e-9);
        // direction (1, 2) / sqrt(5)
        let loadings = &summary.components[0].loadings;
        assert!((loadings[0] - 1.0 / 5f64.sqrt()).abs() < 1e-6);
        assert!((loadings[1] - 2.0 / 5f64.sqrt()).abs() < 1e-6);

        let pc1 = scores(&out, "PC1");
        assert!(pc1.windows(2).all(|w| w[0] < w[1]));
        assert!(pc1.iter().sum::<f64>().abs() < 1e-9);
    }

    #[test]
    fn test_components_are_orthonormal_and_ordered() {
        let df = df![
            "a" => [2.0, 0.5, -1.0, 3.0, 1.5, -2.0, 0.0, 1.0],
            "b" => [1.0, 1.5, -0.5, 2.0, -1.0, -1.5, 0.5, 0.0],
            "c" => [0.1, -0.3, 0.2, 0.0, 0.4, -0.2, 0.1, -0.3],
        ]
        .unwrap();

        let (_, summary) = PcaReducer::new(3).apply(&df).unwrap();
        let components = &summary.components;

        for (i, a) in components.iter().enumerate() {
            assert!((dot(&a.loadings, &a.loadings) - 1.0).abs() < 1e-6);
            for b in &components[i + 1..] {
                assert!(dot(&a.loadings, &b.loadings).abs() < 1e-4);
                assert!(a.eigenvalue >= b.eigenvalue - 1e-9);
            }
        }
        assert!((summary.explained_variance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_row_index_and_target_pass_through() {
        let df = df![
            ROW_INDEX => [4u32, 7, 9],
            "depth" => [1.0, 2.0, 4.0],
            "zoning" => ["RSA5", "RM1", "RSA5"],
            "market_value_capped" => [0.5, -0.1, 1.2],
        ]
        .unwrap();

        let (out, summary) = PcaReducer::new(10)
            .with_passthrough("market_value_capped")
            .apply(&df)
            .unwrap();

        assert_eq!(summary.features, vec!["depth"]);
        assert_eq!(
            column_names(&out),
            vec![ROW_INDEX, "PC1", "market_value_capped"]
        );
        assert_eq!(scores(&out, "market_value_capped"), vec![0.5, -0.1, 1.2]);
    }

    #[test]
    fn test_same_input_projects_identically() {
        let df = df![
            "a" => [1.0, 3.0, 2.0, 5.0, 4.0],
            "b" => [2.0, 1.0, 4.0, 3.0, 5.0],
        ]
        .unwrap();
        let (first, _) = PcaReducer::new(2).apply(&df).unwrap();
        let (second, _) = PcaReducer::new(2).apply(&df).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_missing_value_projects_as_mean() {
        let df = df!["depth" => [Some(1.0), None, Some(3.0)]].unwrap();
        let (out, _) = PcaReducer::new(1).apply(&df).unwrap();
        let pc1 = scores(&out, "PC1");
        assert!(pc1[1].abs() < 1e-12);
    }

    #[test]
    fn test_single_row_is_rejected() {
        let df = df!["depth" => [1.0]].unwrap();
        let err = PcaReducer::new(1).apply(&df).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientRows { found: 1, .. }));
    }

    #[test]
    fn test_text_feature_is_rejected() {
        let df = df!["zoning" => ["RSA5", "RM1"]].unwrap();
        let err = PcaReducer::new(1)
            .with_features(["zoning"])
            .apply(&df)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NonNumericColumn { .. }));
    }
}
