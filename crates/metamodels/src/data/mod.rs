//! Input tables and per-task partitions.
//!
//! # Overview
//!
//! - [`PerformanceTable`]: one row per observed (task, configuration, accuracy)
//! - [`MetaFeatureTable`]: one meta-feature vector per task
//! - [`EvaluationData`]: the two tables joined on task id, ready for evaluation
//! - [`TaskPartition`]: the rows of one held-out task and of all other tasks
//! - [`FeatureView`]: how configuration parameters become a feature matrix
//!
//! Tables are immutable once built. Filtering and joining return new tables.

pub mod io;
pub mod views;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

pub use views::{polynomial_features, FeatureView};

// =============================================================================
// TaskId
// =============================================================================

/// Identifier of a task (dataset / benchmark problem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// =============================================================================
// DataError
// =============================================================================

/// Errors raised while building, joining or partitioning tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("{what} has length {got}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("task {0} has no rows")]
    UnknownTask(TaskId),

    #[error("task {0} has no meta-features")]
    MissingMetaFeatures(TaskId),

    #[error("duplicate meta-feature row for task {0}")]
    DuplicateTask(TaskId),

    #[error("meta-feature {feature} of task {task_id} is missing; impute before joining")]
    NotImputed { task_id: TaskId, feature: String },

    #[error("no performance rows left after joining with meta-features")]
    EmptyJoin,

    #[error("task {task_id} has {rows} rows, more than {required} required")]
    TooFewTaskRows {
        task_id: TaskId,
        rows: usize,
        required: usize,
    },

    #[error("task {task_id} has {distinct} distinct configurations, more than {required} required")]
    TooFewConfigurations {
        task_id: TaskId,
        distinct: usize,
        required: usize,
    },

    #[error("invalid task id {value} in row {row}")]
    InvalidTaskId { row: usize, value: f64 },

    #[error("polynomial degree must be at least 1")]
    InvalidDegree,
}

// =============================================================================
// PerformanceTable
// =============================================================================

/// Observed performances of algorithm configurations on tasks.
///
/// Row `i` holds the hyperparameters `params[i, ..]` of one configuration,
/// the task it was run on and the predictive accuracy it reached. Optional
/// categorical columns (e.g. the SVM kernel) are kept for row filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceTable {
    param_names: Vec<String>,
    task_ids: Vec<TaskId>,
    params: Array2<f64>,
    targets: Array1<f64>,
    categories: BTreeMap<String, Vec<Option<String>>>,
}

impl PerformanceTable {
    /// Create a table from parameter columns and targets.
    ///
    /// `params` has shape `[n_rows, param_names.len()]`.
    pub fn new(
        param_names: Vec<String>,
        task_ids: Vec<TaskId>,
        params: Array2<f64>,
        targets: Array1<f64>,
    ) -> Result<Self, DataError> {
        let n_rows = task_ids.len();
        if params.nrows() != n_rows {
            return Err(DataError::ShapeMismatch {
                what: "parameter rows",
                expected: n_rows,
                got: params.nrows(),
            });
        }
        if params.ncols() != param_names.len() {
            return Err(DataError::ShapeMismatch {
                what: "parameter columns",
                expected: param_names.len(),
                got: params.ncols(),
            });
        }
        if targets.len() != n_rows {
            return Err(DataError::ShapeMismatch {
                what: "targets",
                expected: n_rows,
                got: targets.len(),
            });
        }
        Ok(Self {
            param_names,
            task_ids,
            params,
            targets,
            categories: BTreeMap::new(),
        })
    }

    /// Attach a categorical column.
    pub fn with_category(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> Result<Self, DataError> {
        if values.len() != self.n_rows() {
            return Err(DataError::ShapeMismatch {
                what: "categorical column",
                expected: self.n_rows(),
                got: values.len(),
            });
        }
        self.categories.insert(name.into(), values);
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.task_ids.len()
    }

    pub fn n_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    /// Parameter matrix, shape `[n_rows, n_params]`.
    pub fn params(&self) -> ArrayView2<'_, f64> {
        self.params.view()
    }

    /// Predictive accuracy per row.
    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    pub fn category(&self, name: &str) -> Option<&[Option<String>]> {
        self.categories.get(name).map(Vec::as_slice)
    }

    /// Keep only the rows whose categorical `column` equals `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Self, DataError> {
        let values = self
            .categories
            .get(column)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))?;
        let rows: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_deref() == Some(value))
            .map(|(i, _)| i)
            .collect();
        Ok(self.select_rows(&rows))
    }

    /// New table holding `rows` in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            param_names: self.param_names.clone(),
            task_ids: rows.iter().map(|&r| self.task_ids[r]).collect(),
            params: self.params.select(Axis(0), rows),
            targets: self.targets.select(Axis(0), rows),
            categories: self
                .categories
                .iter()
                .map(|(name, values)| {
                    (name.clone(), rows.iter().map(|&r| values[r].clone()).collect())
                })
                .collect(),
        }
    }

    /// Distinct task ids in order of first appearance.
    pub fn distinct_tasks(&self) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        self.task_ids
            .iter()
            .copied()
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Number of distinct parameter vectors among `rows`.
    pub fn n_distinct_configurations(&self, rows: &[usize]) -> usize {
        rows.iter()
            .map(|&r| {
                self.params
                    .row(r)
                    .iter()
                    .map(|v| v.to_bits())
                    .collect::<Vec<u64>>()
            })
            .collect::<HashSet<_>>()
            .len()
    }
}

// =============================================================================
// MetaFeatureTable
// =============================================================================

/// Dataset-level descriptive statistics, one fixed-length vector per task.
///
/// Missing entries are stored as NaN until [`impute_missing`](Self::impute_missing)
/// replaces them.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFeatureTable {
    names: Vec<String>,
    rows: BTreeMap<TaskId, Vec<f64>>,
}

impl MetaFeatureTable {
    /// Create an empty table with the given feature names.
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            rows: BTreeMap::new(),
        }
    }

    /// Add the meta-feature vector of a task.
    pub fn insert(&mut self, task_id: TaskId, values: Vec<f64>) -> Result<(), DataError> {
        if values.len() != self.names.len() {
            return Err(DataError::ShapeMismatch {
                what: "meta-feature vector",
                expected: self.names.len(),
                got: values.len(),
            });
        }
        if self.rows.insert(task_id, values).is_some() {
            return Err(DataError::DuplicateTask(task_id));
        }
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn n_tasks(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, task_id: TaskId) -> Option<&[f64]> {
        self.rows.get(&task_id).map(Vec::as_slice)
    }

    /// Replace every missing (NaN) entry with `sentinel`.
    pub fn impute_missing(mut self, sentinel: f64) -> Self {
        for values in self.rows.values_mut() {
            for v in values.iter_mut().filter(|v| v.is_nan()) {
                *v = sentinel;
            }
        }
        self
    }

    /// First missing entry, as `(task, feature index)`.
    fn first_missing(&self) -> Option<(TaskId, usize)> {
        self.rows.iter().find_map(|(task, values)| {
            values.iter().position(|v| v.is_nan()).map(|i| (*task, i))
        })
    }
}

// =============================================================================
// EvaluationData
// =============================================================================

/// Performance rows joined with imputed meta-features.
///
/// Every row's task is guaranteed to have a meta-feature vector.
#[derive(Debug, Clone)]
pub struct EvaluationData {
    performances: PerformanceTable,
    metafeatures: MetaFeatureTable,
    dropped_rows: usize,
}

impl EvaluationData {
    /// Inner join on task id.
    ///
    /// Rows of tasks without meta-features are dropped. Meta-features must
    /// already be imputed.
    pub fn join(
        performances: PerformanceTable,
        metafeatures: MetaFeatureTable,
    ) -> Result<Self, DataError> {
        if let Some((task_id, idx)) = metafeatures.first_missing() {
            return Err(DataError::NotImputed {
                task_id,
                feature: metafeatures.names[idx].clone(),
            });
        }

        let keep: Vec<usize> = performances
            .task_ids()
            .iter()
            .enumerate()
            .filter(|(_, t)| metafeatures.get(**t).is_some())
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(DataError::EmptyJoin);
        }

        let dropped_rows = performances.n_rows() - keep.len();
        let performances = if dropped_rows == 0 {
            performances
        } else {
            performances.select_rows(&keep)
        };

        Ok(Self {
            performances,
            metafeatures,
            dropped_rows,
        })
    }

    pub fn performances(&self) -> &PerformanceTable {
        &self.performances
    }

    pub fn metafeatures(&self) -> &MetaFeatureTable {
        &self.metafeatures
    }

    /// Number of performance rows removed by the join.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Tasks in order of first appearance.
    pub fn tasks(&self) -> Vec<TaskId> {
        self.performances.distinct_tasks()
    }

    /// Split rows into the given task and all other tasks.
    pub fn partition(&self, task_id: TaskId) -> Result<TaskPartition, DataError> {
        let task_ids = &self.performances.task_ids;
        let (task_rows, other_rows): (Vec<usize>, Vec<usize>) =
            (0..self.performances.n_rows()).partition(|&r| task_ids[r] == task_id);
        if task_rows.is_empty() {
            return Err(DataError::UnknownTask(task_id));
        }
        Ok(TaskPartition {
            task_id,
            task_rows,
            other_rows,
        })
    }

    /// Targets of `rows`.
    pub fn targets(&self, rows: &[usize]) -> Array1<f64> {
        self.performances.targets.select(Axis(0), rows)
    }

    /// Meta-feature vector of the task that row `row` belongs to.
    pub(crate) fn row_metafeatures(&self, row: usize) -> Result<&[f64], DataError> {
        let task_id = self.performances.task_ids[row];
        self.metafeatures
            .get(task_id)
            .ok_or(DataError::MissingMetaFeatures(task_id))
    }
}

// =============================================================================
// TaskPartition
// =============================================================================

/// Rows of one held-out task and rows of every other task.
///
/// This is the unit of one leave-one-task-out iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPartition {
    pub task_id: TaskId,
    /// Row indices of the held-out task.
    pub task_rows: Vec<usize>,
    /// Row indices of all other tasks.
    pub other_rows: Vec<usize>,
}

impl TaskPartition {
    /// Check that the held-out task has more than `min_rows` rows and more
    /// than `min_configurations` distinct configurations.
    pub fn check_size(
        &self,
        data: &EvaluationData,
        min_rows: usize,
        min_configurations: usize,
    ) -> Result<(), DataError> {
        if self.task_rows.len() <= min_rows {
            return Err(DataError::TooFewTaskRows {
                task_id: self.task_id,
                rows: self.task_rows.len(),
                required: min_rows,
            });
        }
        let distinct = data.performances.n_distinct_configurations(&self.task_rows);
        if distinct <= min_configurations {
            return Err(DataError::TooFewConfigurations {
                task_id: self.task_id,
                distinct,
                required: min_configurations,
            });
        }
        Ok(())
    }
}
