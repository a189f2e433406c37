//! Evaluation errors.
//!
//! Errors nest from the inside out: a [`MetricError`] or [`FitError`] inside a
//! [`FoldError`], inside a [`CvError`] that knows the fold index, inside an
//! [`EvalError`] that knows the task and strategy.

use std::fmt;

use super::metrics::MetricError;
use super::strategy::Strategy;
use crate::data::{DataError, TaskId};
use crate::model::FitError;

/// Failure while evaluating one fold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FoldError {
    #[error("fit failed: {0}")]
    Fit(FitError),

    #[error("prediction failed: {0}")]
    Predict(FitError),

    #[error("scoring the {side} side failed: {source}")]
    Metric {
        side: &'static str,
        #[source]
        source: MetricError,
    },
}

/// Failure while cross-validating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CvError {
    #[error("fold count must be at least 1")]
    ZeroFolds,

    #[error("cannot split {rows} rows into {folds} folds")]
    TooFewRows { rows: usize, folds: usize },

    #[error("fold {fold}: {source}")]
    Fold {
        fold: usize,
        #[source]
        source: FoldError,
    },
}

/// What went wrong within a task.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskFailure {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Fold(#[from] FoldError),

    #[error(transparent)]
    CrossValidation(#[from] CvError),
}

/// An evaluation failure with the task and strategy it happened in.
///
/// `strategy` is `None` for failures before any strategy ran, such as a task
/// that is too small.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub task_id: TaskId,
    pub strategy: Option<Strategy>,
    pub failure: TaskFailure,
}

impl EvalError {
    pub fn new(
        task_id: TaskId,
        strategy: Option<Strategy>,
        failure: impl Into<TaskFailure>,
    ) -> Self {
        Self {
            task_id,
            strategy,
            failure: failure.into(),
        }
    }

    /// Fold index, when the failure happened inside a cross-validation fold.
    pub fn fold(&self) -> Option<usize> {
        match &self.failure {
            TaskFailure::CrossValidation(CvError::Fold { fold, .. }) => Some(*fold),
            _ => None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {}", self.task_id)?;
        if let Some(strategy) = self.strategy {
            write!(f, ", strategy {strategy}")?;
        }
        write!(f, ": {}", self.failure)
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}
