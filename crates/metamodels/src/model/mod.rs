//! Surrogate regression models.
//!
//! A surrogate predicts the performance of a configuration from its feature
//! vector. Every estimator implements [`Surrogate`]:
//!
//! - [`LinearSurrogate`]: closed-form least squares (the "quadratic" surrogate
//!   when fed polynomial features)
//! - [`RandomForestSurrogate`]: bagged regression trees
//!
//! [`SurrogateKind`] selects an estimator at runtime and builds fresh,
//! unfitted instances of it, so a fit never leaks state from an earlier one.

mod config;
pub mod forest;
pub mod linear;
pub mod tree;

use std::collections::HashSet;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::utils::Parallelism;

pub use config::{ConfigError, ForestConfig, LinearConfig};
pub use forest::RandomForestSurrogate;
pub use linear::LinearSurrogate;
pub use tree::RegressionTree;

// =============================================================================
// FitError
// =============================================================================

/// Errors raised by [`Surrogate::fit`] and [`Surrogate::predict`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature matrix has {rows} rows but {targets} targets were given")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("model was fitted on {expected} features, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("non-finite feature value at row {row}, column {col}")]
    NonFiniteFeature { row: usize, col: usize },

    #[error("non-finite target at row {row}")]
    NonFiniteTarget { row: usize },

    #[error("training set has {distinct} distinct rows, at least 2 required")]
    TooFewDistinctRows { distinct: usize },

    #[error("normal equations are not positive definite")]
    Singular,
}

/// Validate a training set.
///
/// Requires matching lengths, finite values everywhere and at least two
/// distinct feature rows. Imputed entries are ordinary finite values.
pub fn check_training_data(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
) -> Result<(), FitError> {
    if x.nrows() != y.len() {
        return Err(FitError::ShapeMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    for (row, values) in x.outer_iter().enumerate() {
        if let Some(col) = values.iter().position(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteFeature { row, col });
        }
    }
    if let Some(row) = y.iter().position(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteTarget { row });
    }

    let mut distinct = HashSet::new();
    for values in x.outer_iter() {
        distinct.insert(values.iter().map(|v| v.to_bits()).collect::<Vec<u64>>());
        if distinct.len() >= 2 {
            return Ok(());
        }
    }
    Err(FitError::TooFewDistinctRows {
        distinct: distinct.len(),
    })
}

// =============================================================================
// Surrogate
// =============================================================================

/// A regression model with a fit/predict interface.
///
/// `fit` replaces all learned state, so refitting an instance is equivalent to
/// fitting a fresh one. Fitting mutates the model: an instance must be owned
/// exclusively by whoever fits it.
pub trait Surrogate: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fit on features `x` (shape `[n_rows, n_features]`) and targets `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError>;
}

// =============================================================================
// SurrogateKind
// =============================================================================

/// The estimator families used by the evaluation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurrogateKind {
    /// Closed-form least squares.
    Linear,
    /// Random forest regressor.
    Forest,
}

impl SurrogateKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Forest => "random_forest",
        }
    }

    /// Build a fresh, unfitted estimator of this kind.
    ///
    /// `seed` overrides the forest seed so each unit of work gets its own
    /// reproducible random stream.
    pub fn build(
        self,
        linear: &LinearConfig,
        forest: &ForestConfig,
        seed: u64,
    ) -> AnySurrogate {
        match self {
            Self::Linear => AnySurrogate::Linear(LinearSurrogate::new(linear.clone())),
            Self::Forest => {
                AnySurrogate::Forest(RandomForestSurrogate::new(forest.clone().with_seed(seed)))
            }
        }
    }
}

/// A surrogate selected at runtime.
#[derive(Debug, Clone)]
pub enum AnySurrogate {
    Linear(LinearSurrogate),
    Forest(RandomForestSurrogate),
}

impl AnySurrogate {
    /// Let the forest grow its trees in parallel when allowed. The linear
    /// surrogate has no parallel path.
    pub fn with_parallelism(self, parallelism: Parallelism) -> Self {
        match self {
            Self::Forest(inner) => Self::Forest(inner.with_parallelism(parallelism)),
            linear => linear,
        }
    }
}

impl Surrogate for AnySurrogate {
    fn name(&self) -> &'static str {
        match self {
            Self::Linear(inner) => inner.name(),
            Self::Forest(inner) => inner.name(),
        }
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        match self {
            Self::Linear(inner) => inner.fit(x, y),
            Self::Forest(inner) => inner.fit(x, y),
        }
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        match self {
            Self::Linear(inner) => inner.predict(x),
            Self::Forest(inner) => inner.predict(x),
        }
    }
}
