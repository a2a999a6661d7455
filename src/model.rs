// Multi-target linear regression over encoded feature vectors.
//
// The one-hot blocks make the design matrix rank deficient (each block sums
// to the intercept column), so the fit goes through a pseudo-inverse of the
// Gram matrix instead of a plain solve: eigendecompose X'X, invert only the
// eigenvalues above a relative threshold. This is the minimum-norm least
// squares solution per target, solved for all targets at once.
use linfa::prelude::SingleTargetRegression;
use linfa_linalg::eigh::Eigh;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Eigenvalues below `RCOND * max_eigenvalue` are treated as zero.
const RCOND: f64 = 1e-9;

/// Fitted linear model: one weight row and one intercept per target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetModel {
    weights: Array2<f64>,
    intercepts: Array1<f64>,
    targets: Vec<String>,
}

/// Offline evaluation metrics for one target.
#[derive(Debug)]
pub struct TargetReport {
    pub target: String,
    pub mse: f64,
    pub r2: f64,
}

/// Per-target metrics plus their uniform averages.
#[derive(Debug)]
pub struct EvaluationReport {
    pub per_target: Vec<TargetReport>,
    pub mse: f64,
    pub r2: f64,
}

impl BudgetModel {
    /// Fits ordinary least squares with intercept: center the columns, solve
    /// the normal equations through the Gram pseudo-inverse, then recover the
    /// intercepts from the column means.
    pub fn fit(x: &Array2<f64>, y: &Array2<f64>, targets: &[&str]) -> Result<Self, ModelError> {
        let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let y_mean = y.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let x_centered = x - &x_mean;
        let y_centered = y - &y_mean;

        let gram = x_centered.t().dot(&x_centered);
        let rhs = x_centered.t().dot(&y_centered);

        let (eigvals, eigvecs) = gram.eigh()?;
        let max_eig = eigvals.iter().fold(0.0_f64, |acc, &v| acc.max(v));
        let threshold = max_eig * RCOND;
        let inverted = eigvals.mapv(|v| if v > threshold { 1.0 / v } else { 0.0 });

        // pinv(X'X) = V diag(1/λ) V'
        let pinv = (&eigvecs * &inverted).dot(&eigvecs.t());
        let coefficients = pinv.dot(&rhs);

        let weights = coefficients.t().to_owned();
        let intercepts = &y_mean - &weights.dot(&x_mean);

        Ok(BudgetModel {
            weights,
            intercepts,
            targets: targets.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Number of encoded features the model was fitted against.
    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Weight row for one target, indexed like the encoded feature vector.
    pub fn weights_for(&self, target_index: usize) -> ndarray::ArrayView1<'_, f64> {
        self.weights.row(target_index)
    }

    /// `W·x + b` for a single encoded vector. A length mismatch means the
    /// encoder and model artifacts disagree, which is never a caller error.
    pub fn predict(&self, encoded: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        if encoded.len() != self.n_features() {
            return Err(ModelError::FeatureCountMismatch {
                got: encoded.len(),
                expected: self.n_features(),
            });
        }
        Ok(self.weights.dot(encoded) + &self.intercepts)
    }

    /// Batch form of `predict`, one prediction row per input row.
    pub fn predict_batch(&self, encoded: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        if encoded.ncols() != self.n_features() {
            return Err(ModelError::FeatureCountMismatch {
                got: encoded.ncols(),
                expected: self.n_features(),
            });
        }
        Ok(encoded.dot(&self.weights.t()) + &self.intercepts)
    }

    /// MSE and R² per target plus their uniform averages. Offline reporting
    /// only; serving never calls this.
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<EvaluationReport, ModelError> {
        let predictions = self.predict_batch(x)?;
        let mut per_target = Vec::with_capacity(self.targets.len());
        for (j, target) in self.targets.iter().enumerate() {
            let predicted = predictions.column(j).to_owned();
            let actual = y.column(j).to_owned();
            per_target.push(TargetReport {
                target: target.clone(),
                mse: predicted.mean_squared_error(&actual)?,
                r2: predicted.r2(&actual)?,
            });
        }
        let count = per_target.len() as f64;
        let mse = per_target.iter().map(|t| t.mse).sum::<f64>() / count;
        let r2 = per_target.iter().map(|t| t.r2).sum::<f64>() / count;
        Ok(EvaluationReport { per_target, mse, r2 })
    }
}
