//! Evaluation strategies and the records they produce.
//!
//! A strategy pairs an estimator family with a feature view and a protocol:
//!
//! | Strategy             | Label                 | Estimator | View             | Protocol    |
//! |----------------------|-----------------------|-----------|------------------|-------------|
//! | `QuadraticSurrogate` | `quadratic_surrogate` | linear    | polynomial       | within-task |
//! | `ForestSurrogate`    | `RF_surrogate`        | forest    | raw              | within-task |
//! | `QuadraticAggregate` | `quadratic_aggregate` | linear    | polynomial       | cross-task  |
//! | `ForestAggregate`    | `RF_aggregate`        | forest    | raw              | cross-task  |
//! | `QuadraticMeta`      | `quadratic_meta`      | linear    | polynomial+meta  | cross-task  |
//! | `ForestMeta`         | `RF_meta`             | forest    | raw+meta         | cross-task  |
//!
//! Within-task strategies cross-validate on the held-out task's own rows and
//! report `test` and `train-obs` records. Cross-task strategies train on all
//! other tasks, test on the held-out task and report `test` and
//! `train-tasks` records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cv::cross_validate_surrogate;
use super::error::TaskFailure;
use super::fold::evaluate_fold;
use super::metrics::RankingScore;
use crate::data::{EvaluationData, FeatureView, TaskId, TaskPartition};
use crate::model::{Surrogate, SurrogateKind};

// =============================================================================
// Strategy
// =============================================================================

/// A named way of building and evaluating a surrogate for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "quadratic_surrogate")]
    QuadraticSurrogate,
    #[serde(rename = "RF_surrogate")]
    ForestSurrogate,
    #[serde(rename = "quadratic_aggregate")]
    QuadraticAggregate,
    #[serde(rename = "RF_aggregate")]
    ForestAggregate,
    #[serde(rename = "quadratic_meta")]
    QuadraticMeta,
    #[serde(rename = "RF_meta")]
    ForestMeta,
}

/// How a strategy splits data into training and test rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// K-fold cross-validation over the held-out task's rows.
    WithinTask,
    /// Train on every other task, test on the held-out task.
    CrossTask,
}

impl Protocol {
    /// The set the training-side records are reported under.
    pub fn train_set(self) -> EvaluationSet {
        match self {
            Self::WithinTask => EvaluationSet::TrainObs,
            Self::CrossTask => EvaluationSet::TrainTasks,
        }
    }
}

impl Strategy {
    /// All strategies, in report order.
    pub const ALL: [Strategy; 6] = [
        Self::QuadraticSurrogate,
        Self::ForestSurrogate,
        Self::QuadraticAggregate,
        Self::ForestAggregate,
        Self::QuadraticMeta,
        Self::ForestMeta,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::QuadraticSurrogate => "quadratic_surrogate",
            Self::ForestSurrogate => "RF_surrogate",
            Self::QuadraticAggregate => "quadratic_aggregate",
            Self::ForestAggregate => "RF_aggregate",
            Self::QuadraticMeta => "quadratic_meta",
            Self::ForestMeta => "RF_meta",
        }
    }

    pub fn surrogate_kind(self) -> SurrogateKind {
        match self {
            Self::QuadraticSurrogate | Self::QuadraticAggregate | Self::QuadraticMeta => {
                SurrogateKind::Linear
            }
            Self::ForestSurrogate | Self::ForestAggregate | Self::ForestMeta => {
                SurrogateKind::Forest
            }
        }
    }

    pub fn feature_view(self) -> FeatureView {
        match self {
            Self::QuadraticSurrogate | Self::QuadraticAggregate => FeatureView::Polynomial,
            Self::ForestSurrogate | Self::ForestAggregate => FeatureView::Raw,
            Self::QuadraticMeta => FeatureView::PolynomialMeta,
            Self::ForestMeta => FeatureView::RawMeta,
        }
    }

    pub fn protocol(self) -> Protocol {
        match self {
            Self::QuadraticSurrogate | Self::ForestSurrogate => Protocol::WithinTask,
            _ => Protocol::CrossTask,
        }
    }

    /// Position in [`Strategy::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when parsing an unknown strategy label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy '{0}'")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.label() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

// =============================================================================
// Records
// =============================================================================

/// Which rows a record was scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvaluationSet {
    /// Rows the model did not see.
    #[serde(rename = "test")]
    Test,
    /// Training observations of the held-out task.
    #[serde(rename = "train-obs")]
    TrainObs,
    /// Training rows from the other tasks.
    #[serde(rename = "train-tasks")]
    TrainTasks,
}

impl EvaluationSet {
    pub fn label(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::TrainObs => "train-obs",
            Self::TrainTasks => "train-tasks",
        }
    }
}

impl fmt::Display for EvaluationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub task_id: TaskId,
    pub strategy: Strategy,
    pub set: EvaluationSet,
    pub precision_at_n: f64,
    /// Spearman correlation; `None` when undefined.
    pub rank_correlation: Option<f64>,
    /// Folds whose correlation was defined and averaged into `rank_correlation`.
    pub correlation_folds: usize,
    /// Folds evaluated (1 for cross-task strategies).
    pub n_folds: usize,
}

impl EvaluationRecord {
    fn from_score(
        task_id: TaskId,
        strategy: Strategy,
        set: EvaluationSet,
        score: RankingScore,
    ) -> Self {
        Self {
            task_id,
            strategy,
            set,
            precision_at_n: score.precision,
            rank_correlation: score.correlation,
            correlation_folds: usize::from(score.correlation.is_some()),
            n_folds: 1,
        }
    }
}

// =============================================================================
// Running a strategy
// =============================================================================

/// Scoring and splitting parameters shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategySettings {
    pub precision_at_n: usize,
    pub precision_out_of_k: usize,
    pub cv_folds: usize,
    pub polynomial_degree: usize,
    /// Seed of the within-task fold assignment.
    pub cv_seed: u64,
}

/// Run `strategy` for the held-out task of `partition`.
///
/// `surrogate` must be a fresh instance of `strategy.surrogate_kind()`. It is
/// refitted as needed; no state carries over from previous use.
pub fn evaluate_strategy(
    strategy: Strategy,
    data: &EvaluationData,
    partition: &TaskPartition,
    surrogate: &mut dyn Surrogate,
    settings: &StrategySettings,
) -> Result<Vec<EvaluationRecord>, TaskFailure> {
    let view = strategy.feature_view();
    let degree = settings.polynomial_degree;
    let n = settings.precision_at_n;
    let k = settings.precision_out_of_k;
    let task_id = partition.task_id;

    match strategy.protocol() {
        Protocol::WithinTask => {
            let x = view.build(data, &partition.task_rows, degree)?;
            let y = data.targets(&partition.task_rows);
            let cv = cross_validate_surrogate(
                surrogate,
                x.view(),
                y.view(),
                settings.cv_folds,
                n,
                k,
                settings.cv_seed,
            )?;
            let n_folds = cv.n_folds();
            Ok(vec![
                EvaluationRecord {
                    task_id,
                    strategy,
                    set: EvaluationSet::Test,
                    precision_at_n: cv.test_precision,
                    rank_correlation: cv.test_correlation.mean,
                    correlation_folds: cv.test_correlation.n_defined,
                    n_folds,
                },
                EvaluationRecord {
                    task_id,
                    strategy,
                    set: EvaluationSet::TrainObs,
                    precision_at_n: cv.train_precision,
                    rank_correlation: cv.train_correlation.mean,
                    correlation_folds: cv.train_correlation.n_defined,
                    n_folds,
                },
            ])
        }
        Protocol::CrossTask => {
            let train_x = view.build(data, &partition.other_rows, degree)?;
            let train_y = data.targets(&partition.other_rows);
            let test_x = view.build(data, &partition.task_rows, degree)?;
            let test_y = data.targets(&partition.task_rows);
            let scores = evaluate_fold(
                surrogate,
                train_x.view(),
                train_y.view(),
                test_x.view(),
                test_y.view(),
                n,
                k,
            )?;
            Ok(vec![
                EvaluationRecord::from_score(task_id, strategy, EvaluationSet::Test, scores.test),
                EvaluationRecord::from_score(
                    task_id,
                    strategy,
                    EvaluationSet::TrainTasks,
                    scores.train,
                ),
            ])
        }
    }
}
