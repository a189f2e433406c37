//! Leave-one-task-out evaluation loop.
//!
//! [`TaskEvaluator`] visits every task of an [`EvaluationData`], checks that
//! the task is large enough, and runs each configured [`Strategy`] on it with
//! a fresh estimator. Tasks are independent units of work and may run on a
//! thread pool; records are returned in task order either way.

use bon::Builder;

use super::error::{EvalError, TaskFailure};
use super::logger::{tracing_sink, EvalLogger, LogSink, Verbosity};
use super::strategy::{evaluate_strategy, EvaluationRecord, Strategy, StrategySettings};
use crate::data::{EvaluationData, TaskId, TaskPartition};
use crate::model::{ConfigError, ForestConfig, LinearConfig};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// HarnessConfig
// =============================================================================

/// Settings of an evaluation run.
///
/// # Example
///
/// ```
/// use metamodels::{HarnessConfig, Strategy};
///
/// let config = HarnessConfig::builder()
///     .precision_at_n(10)
///     .precision_out_of_k(50)
///     .strategies(vec![Strategy::QuadraticSurrogate, Strategy::ForestMeta])
///     .build()
///     .unwrap();
/// assert_eq!(config.cv_folds, 5);
/// assert_eq!(config.precision_metric_name(), "precision_at_10_out_50");
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct HarnessConfig {
    /// Size of the top-n window scored by precision. Default: 20.
    #[builder(default = 20)]
    pub precision_at_n: usize,

    /// Size of the pool of best configurations that is ranked. Default: 100.
    #[builder(default = 100)]
    pub precision_out_of_k: usize,

    /// Folds for within-task cross-validation. Default: 5.
    #[builder(default = 5)]
    pub cv_folds: usize,

    /// A task is evaluated only if it has more rows than this. Default: 100.
    #[builder(default = 100)]
    pub min_task_rows: usize,

    /// Degree of the polynomial feature views. Default: 2.
    #[builder(default = 2)]
    pub polynomial_degree: usize,

    /// Strategies to run, in report order. Default: all six.
    #[builder(default = Strategy::ALL.to_vec())]
    pub strategies: Vec<Strategy>,

    /// Linear surrogate settings.
    #[builder(default)]
    pub linear: LinearConfig,

    /// Forest surrogate settings. Its seed is replaced per task and strategy.
    #[builder(default)]
    pub forest: ForestConfig,

    /// Base seed for fold assignment and forest randomness. Default: 0.
    #[builder(default = 0)]
    pub seed: u64,

    /// Worker threads: 0 = all cores, 1 = sequential. Default: 1.
    #[builder(default = 1)]
    pub n_threads: usize,

    /// Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: harness_config_builder::IsComplete> HarnessConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `precision_at_n`, `precision_out_of_k`, `cv_folds` or
    ///   `polynomial_degree` is 0
    /// - `precision_at_n > precision_out_of_k`
    /// - no strategies
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl HarnessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("precision_at_n", self.precision_at_n),
            ("precision_out_of_k", self.precision_out_of_k),
            ("cv_folds", self.cv_folds),
            ("polynomial_degree", self.polynomial_degree),
            ("strategies", self.strategies.len()),
        ] {
            if value < 1 {
                return Err(ConfigError::TooSmall {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        if self.precision_at_n > self.precision_out_of_k {
            return Err(ConfigError::WindowLargerThanPool {
                n: self.precision_at_n,
                k: self.precision_out_of_k,
            });
        }
        Ok(())
    }

    /// Name of the precision metric, e.g. `precision_at_20_out_100`.
    pub fn precision_metric_name(&self) -> String {
        format!(
            "precision_at_{}_out_{}",
            self.precision_at_n, self.precision_out_of_k
        )
    }

    /// Name of the correlation metric, e.g. `spearmanr_100`.
    pub fn correlation_metric_name(&self) -> String {
        format!("spearmanr_{}", self.precision_out_of_k)
    }

    fn strategy_settings(&self, task_id: TaskId) -> StrategySettings {
        StrategySettings {
            precision_at_n: self.precision_at_n,
            precision_out_of_k: self.precision_out_of_k,
            cv_folds: self.cv_folds,
            polynomial_degree: self.polynomial_degree,
            cv_seed: derive_seed(self.seed, &[u64::from(task_id.0)]),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            precision_at_n: 20,
            precision_out_of_k: 100,
            cv_folds: 5,
            min_task_rows: 100,
            polynomial_degree: 2,
            strategies: Strategy::ALL.to_vec(),
            linear: LinearConfig::default(),
            forest: ForestConfig::default(),
            seed: 0,
            n_threads: 1,
            verbosity: Verbosity::Silent,
        }
    }
}

/// Mix `seed` with `parts` into a new seed (splitmix64 finalizer).
fn derive_seed(seed: u64, parts: &[u64]) -> u64 {
    let mut z = seed;
    for &part in parts {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15).wrapping_add(part);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
    }
    z
}

// =============================================================================
// TaskEvaluator
// =============================================================================

/// Output of [`TaskEvaluator::run`].
#[derive(Debug, Clone, Default)]
pub struct EvaluationRun {
    /// Records in task order, then strategy order.
    pub records: Vec<EvaluationRecord>,
    /// Tasks and strategies that could not be evaluated.
    pub failures: Vec<EvalError>,
    /// Tasks visited, including failed ones.
    pub n_tasks: usize,
}

impl EvaluationRun {
    /// Tasks skipped entirely, e.g. for being too small.
    pub fn skipped_tasks(&self) -> Vec<TaskId> {
        self.failures
            .iter()
            .filter(|f| f.strategy.is_none())
            .map(|f| f.task_id)
            .collect()
    }
}

/// Runs the configured strategies for every task.
#[derive(Debug, Clone)]
pub struct TaskEvaluator {
    config: HarnessConfig,
    logger: EvalLogger,
}

impl TaskEvaluator {
    /// Evaluator reporting through `tracing` at the configured verbosity.
    pub fn new(config: HarnessConfig) -> Self {
        let logger = EvalLogger::new(config.verbosity, tracing_sink());
        Self { config, logger }
    }

    /// Report through `sink` instead of `tracing`.
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.logger = EvalLogger::new(self.config.verbosity, sink);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Evaluate every task in `data`.
    ///
    /// A task that fails its size check is skipped; a strategy that fails on
    /// a task is skipped for that task only. Both are recorded in
    /// [`EvaluationRun::failures`] and never abort the run.
    pub fn run(&self, data: &EvaluationData) -> EvaluationRun {
        let tasks = data.tasks();
        let total = tasks.len();
        let mut logger = self.logger.clone();
        logger.start_run(total, self.config.strategies.len());

        let outcomes = run_with_threads(self.config.n_threads, |parallelism| {
            parallelism.maybe_par_map(0..total, |i| {
                logger.task_started(tasks[i], i + 1, total);
                self.run_task(data, tasks[i], &logger, parallelism)
            })
        });

        let mut run = EvaluationRun {
            n_tasks: total,
            ..EvaluationRun::default()
        };
        for (records, failures) in outcomes {
            for failure in &failures {
                logger.evaluation_failed(failure);
            }
            run.records.extend(records);
            run.failures.extend(failures);
        }
        logger.finish_run(run.records.len(), run.failures.len());
        run
    }

    /// Evaluate a single task, failing on the first error.
    pub fn evaluate_task(
        &self,
        data: &EvaluationData,
        task_id: TaskId,
    ) -> Result<Vec<EvaluationRecord>, EvalError> {
        let partition = self.prepare(data, task_id)?;
        run_with_threads(self.config.n_threads, |parallelism| {
            let mut records = Vec::new();
            for &strategy in &self.config.strategies {
                records.extend(self.run_strategy(
                    data,
                    &partition,
                    strategy,
                    &self.logger,
                    parallelism,
                )?);
            }
            Ok(records)
        })
    }

    fn run_task(
        &self,
        data: &EvaluationData,
        task_id: TaskId,
        logger: &EvalLogger,
        parallelism: Parallelism,
    ) -> (Vec<EvaluationRecord>, Vec<EvalError>) {
        let partition = match self.prepare(data, task_id) {
            Ok(partition) => partition,
            Err(err) => return (Vec::new(), vec![err]),
        };
        let mut records = Vec::new();
        let mut failures = Vec::new();
        for &strategy in &self.config.strategies {
            match self.run_strategy(data, &partition, strategy, logger, parallelism) {
                Ok(r) => records.extend(r),
                Err(err) => failures.push(err),
            }
        }
        (records, failures)
    }

    /// Partition `data` around `task_id` and check the task's size.
    ///
    /// The task needs more than `min_task_rows` rows and more distinct
    /// configurations than the precision window.
    fn prepare(&self, data: &EvaluationData, task_id: TaskId) -> Result<TaskPartition, EvalError> {
        let fail = |e| EvalError::new(task_id, None, TaskFailure::Data(e));
        let partition = data.partition(task_id).map_err(fail)?;
        partition
            .check_size(data, self.config.min_task_rows, self.config.precision_at_n)
            .map_err(fail)?;
        Ok(partition)
    }

    fn run_strategy(
        &self,
        data: &EvaluationData,
        partition: &TaskPartition,
        strategy: Strategy,
        logger: &EvalLogger,
        parallelism: Parallelism,
    ) -> Result<Vec<EvaluationRecord>, EvalError> {
        let task_id = partition.task_id;
        let seed = derive_seed(
            self.config.seed,
            &[u64::from(task_id.0), strategy.index() as u64],
        );
        let mut surrogate = strategy
            .surrogate_kind()
            .build(&self.config.linear, &self.config.forest, seed)
            .with_parallelism(parallelism);
        let records = evaluate_strategy(
            strategy,
            data,
            partition,
            &mut surrogate,
            &self.config.strategy_settings(task_id),
        )
        .map_err(|failure| EvalError::new(task_id, Some(strategy), failure))?;
        logger.strategy_finished(task_id, strategy, &records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataError;
    use crate::evaluation::EvaluationSet;
    use crate::testing::data::synthetic_evaluation_data;
    use std::sync::{Arc, Mutex};

    fn small_config() -> HarnessConfig {
        HarnessConfig::builder()
            .precision_at_n(5)
            .precision_out_of_k(20)
            .cv_folds(3)
            .min_task_rows(30)
            .forest(ForestConfig::builder().n_trees(4).build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn defaults_match_builder() {
        let built = HarnessConfig::builder().build().unwrap();
        let default = HarnessConfig::default();
        assert_eq!(built.precision_at_n, default.precision_at_n);
        assert_eq!(built.precision_out_of_k, default.precision_out_of_k);
        assert_eq!(built.cv_folds, default.cv_folds);
        assert_eq!(built.min_task_rows, default.min_task_rows);
        assert_eq!(built.strategies, default.strategies);
        assert_eq!(built.correlation_metric_name(), "spearmanr_100");
    }

    #[test]
    fn rejects_window_larger_than_pool() {
        let err = HarnessConfig::builder()
            .precision_at_n(30)
            .precision_out_of_k(20)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::WindowLargerThanPool { n: 30, k: 20 });
    }

    #[test]
    fn rejects_zero_folds_and_empty_strategies() {
        assert!(matches!(
            HarnessConfig::builder().cv_folds(0).build(),
            Err(ConfigError::TooSmall { field: "cv_folds", .. })
        ));
        assert!(matches!(
            HarnessConfig::builder().strategies(vec![]).build(),
            Err(ConfigError::TooSmall { field: "strategies", .. })
        ));
    }

    #[test]
    fn derived_seeds_differ_per_part() {
        assert_ne!(derive_seed(0, &[1]), derive_seed(0, &[2]));
        assert_ne!(derive_seed(0, &[1, 0]), derive_seed(0, &[1, 1]));
        assert_eq!(derive_seed(7, &[3, 4]), derive_seed(7, &[3, 4]));
    }

    #[test]
    fn run_produces_two_records_per_task_and_strategy() {
        let data = synthetic_evaluation_data(3, 40, 4).unwrap();
        let run = TaskEvaluator::new(small_config()).run(&data);
        assert!(run.failures.is_empty(), "{:?}", run.failures);
        assert_eq!(run.n_tasks, 3);
        assert_eq!(run.records.len(), 3 * 6 * 2);

        // Task order, then strategy order
        assert_eq!(run.records[0].task_id, TaskId(1));
        assert_eq!(run.records[0].strategy, Strategy::QuadraticSurrogate);
        assert_eq!(run.records[0].set, EvaluationSet::Test);
        assert_eq!(run.records[12].task_id, TaskId(2));
    }

    #[test]
    fn small_task_is_skipped_and_reported() {
        let data = synthetic_evaluation_data(2, 30, 4).unwrap();
        let run = TaskEvaluator::new(small_config()).run(&data);
        assert!(run.records.is_empty());
        assert_eq!(run.skipped_tasks(), vec![TaskId(1), TaskId(2)]);
        assert_eq!(
            run.failures[0].failure,
            TaskFailure::Data(DataError::TooFewTaskRows {
                task_id: TaskId(1),
                rows: 30,
                required: 30,
            })
        );
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let data = synthetic_evaluation_data(4, 35, 8).unwrap();
        let sequential = TaskEvaluator::new(small_config()).run(&data);
        let mut config = small_config();
        config.n_threads = 3;
        let parallel = TaskEvaluator::new(config).run(&data);
        assert_eq!(sequential.records, parallel.records);
    }

    #[test]
    fn threaded_task_grows_forests_in_parallel_with_same_records() {
        let data = synthetic_evaluation_data(2, 40, 3).unwrap();
        let mut config = small_config();
        config.strategies = vec![Strategy::ForestSurrogate, Strategy::ForestMeta];
        let sequential = TaskEvaluator::new(config.clone())
            .evaluate_task(&data, TaskId(1))
            .unwrap();
        config.n_threads = 2;
        let threaded = TaskEvaluator::new(config)
            .evaluate_task(&data, TaskId(1))
            .unwrap();
        assert_eq!(sequential, threaded);
    }

    #[test]
    fn progress_goes_to_injected_sink() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);
        let mut config = small_config();
        config.verbosity = Verbosity::Info;
        config.strategies = vec![Strategy::QuadraticSurrogate];

        let data = synthetic_evaluation_data(2, 40, 1).unwrap();
        TaskEvaluator::new(config)
            .with_log_sink(Arc::new(move |_: Verbosity, msg: &str| {
                sink_lines.lock().unwrap().push(msg.to_string())
            }))
            .run(&data);

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&"Processing task 1 (1/2)".to_string()));
        assert!(lines.contains(&"Processing task 2 (2/2)".to_string()));
    }
}
