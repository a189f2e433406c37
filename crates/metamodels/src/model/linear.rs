//! Closed-form least-squares surrogate.
//!
//! Fits `y ≈ X·w + b` by solving the normal equations on standardized
//! columns with a Cholesky factorization. Constant columns get a zero weight.
//! Fed with [`polynomial_features`](crate::data::polynomial_features) of
//! degree 2, this is the quadratic surrogate.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{check_training_data, FitError, LinearConfig, Surrogate};

/// Learned coefficients.
#[derive(Debug, Clone, PartialEq)]
struct LinearFit {
    weights: Array1<f64>,
    intercept: f64,
}

/// Least-squares linear regressor.
#[derive(Debug, Clone)]
pub struct LinearSurrogate {
    config: LinearConfig,
    fit: Option<LinearFit>,
}

impl LinearSurrogate {
    pub fn new(config: LinearConfig) -> Self {
        Self { config, fit: None }
    }

    /// Weights in the original feature scale, if fitted.
    pub fn weights(&self) -> Option<ArrayView1<'_, f64>> {
        self.fit.as_ref().map(|f| f.weights.view())
    }

    /// Intercept, if fitted.
    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }
}

impl Default for LinearSurrogate {
    fn default() -> Self {
        Self::new(LinearConfig::default())
    }
}

impl Surrogate for LinearSurrogate {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        self.fit = None;
        check_training_data(x, y)?;

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let means = x.mean_axis(Axis(0)).ok_or(FitError::EmptyTrainingSet)?;
        let stds = x.std_axis(Axis(0), 0.0);
        let y_mean = y.sum() / n_rows as f64;

        // Columns with no spread carry no information and would make the
        // system singular.
        let active: Vec<usize> = (0..n_features)
            .filter(|&j| stds[j] > 1e-12 * means[j].abs().max(1.0))
            .collect();

        let mut weights = Array1::zeros(n_features);
        if !active.is_empty() {
            let mut z = Array2::zeros((n_rows, active.len()));
            for (k, &j) in active.iter().enumerate() {
                let col = x.column(j);
                let mut out = z.column_mut(k);
                for (o, &v) in out.iter_mut().zip(col.iter()) {
                    *o = (v - means[j]) / stds[j];
                }
            }
            let y_centered = y.mapv(|v| v - y_mean);

            let mut gram = z.t().dot(&z);
            let ridge = self.config.l2 * n_rows as f64;
            for d in 0..active.len() {
                gram[[d, d]] += ridge;
            }
            let rhs = z.t().dot(&y_centered);
            let solution = cholesky_solve(&gram, &rhs).ok_or(FitError::Singular)?;

            for (k, &j) in active.iter().enumerate() {
                weights[j] = solution[k] / stds[j];
            }
        }

        let intercept = y_mean - weights.dot(&means);
        self.fit = Some(LinearFit { weights, intercept });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        let fit = self.fit.as_ref().ok_or(FitError::NotFitted)?;
        if x.ncols() != fit.weights.len() {
            return Err(FitError::FeatureCountMismatch {
                expected: fit.weights.len(),
                got: x.ncols(),
            });
        }
        Ok(x.dot(&fit.weights) + fit.intercept)
    }
}

/// Solve `a · w = b` for symmetric positive definite `a`.
///
/// Returns `None` if `a` is not numerically positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L · z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Back substitution: Lᵀ · w = z
    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * w[k];
        }
        w[i] = sum / l[[i, i]];
    }
    Some(w)
}
