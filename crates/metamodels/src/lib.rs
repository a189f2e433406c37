//! metamodels: Evaluating surrogate models for algorithm configuration ranking.
//!
//! A surrogate is a regression model that predicts how well an algorithm
//! configuration performs on a task without running it. This crate measures
//! how good such surrogates are at *ranking* configurations, using a
//! leave-one-task-out protocol over a table of observed performances.
//!
//! # Key Types
//!
//! - [`PerformanceTable`] / [`MetaFeatureTable`] / [`EvaluationData`] - Inputs
//! - [`Surrogate`] - Fit/predict interface, with [`LinearSurrogate`] and
//!   [`RandomForestSurrogate`] implementations
//! - [`evaluation::score`] - Precision-at-N-out-of-K and Spearman correlation
//! - [`evaluate_fold`] / [`cross_validate_surrogate`] - Fold-level protocols
//! - [`TaskEvaluator`] / [`HarnessConfig`] - The per-task evaluation loop
//! - [`ResultTable`] - Aggregation and report writing
//!
//! # Running an evaluation
//!
//! ```ignore
//! use metamodels::{EvaluationData, HarnessConfig, TaskEvaluator};
//!
//! let data = EvaluationData::join(performances, metafeatures.impute_missing(-1.0))?;
//! let config = HarnessConfig::builder().precision_at_n(20).precision_out_of_k(100).build()?;
//! let run = TaskEvaluator::new(config).run(&data);
//! for record in &run.records {
//!     println!("{} {} {}", record.task_id, record.strategy, record.precision_at_n);
//! }
//! ```

pub mod data;
pub mod evaluation;
pub mod model;
pub mod report;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Input data
pub use data::{
    DataError, EvaluationData, FeatureView, MetaFeatureTable, PerformanceTable, TaskId,
    TaskPartition,
};

// Surrogates
pub use model::{
    ConfigError, FitError, ForestConfig, LinearConfig, LinearSurrogate, RandomForestSurrogate,
    Surrogate, SurrogateKind,
};

// Evaluation protocol
pub use evaluation::{
    cross_validate_surrogate, evaluate_fold, CvScores, EvalError, EvalLogger, EvaluationRecord,
    EvaluationRun, EvaluationSet, FoldScores, HarnessConfig, RankingScore, Strategy,
    TaskEvaluator, Verbosity,
};

// Reporting
pub use report::{BoxStats, GroupSummary, ResultTable};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
