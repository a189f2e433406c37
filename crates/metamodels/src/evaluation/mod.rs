//! Ranking evaluation of surrogates.
//!
//! This module provides, from the bottom up:
//!
//! - [`metrics`]: precision-at-N-out-of-K and Spearman correlation
//! - [`evaluate_fold`]: fit on one split, score both sides
//! - [`cross_validate_surrogate`]: seeded k-fold averaging
//! - [`Strategy`]: the six estimator/view/protocol combinations
//! - [`TaskEvaluator`]: the leave-one-task-out loop
//! - [`EvalLogger`], [`Verbosity`]: progress reporting

pub mod cv;
mod error;
pub mod fold;
mod harness;
mod logger;
pub mod metrics;
pub mod strategy;

pub use cv::{assign_folds, cross_validate_surrogate, CvScores, MeanScore};
pub use error::{CvError, EvalError, FoldError, TaskFailure};
pub use fold::{evaluate_fold, FoldScores};
pub use harness::{EvaluationRun, HarnessConfig, TaskEvaluator};
pub use logger::{tracing_sink, EvalLogger, LogSink, Verbosity};
pub use metrics::{precision_at_n_out_of_k, score, spearman, MetricError, RankingScore};
pub use strategy::{
    evaluate_strategy, EvaluationRecord, EvaluationSet, Protocol, Strategy, StrategySettings,
    UnknownStrategy,
};
