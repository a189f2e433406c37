use ndarray::{Array1, Array2};
use rand::prelude::*;

use crate::data::{DataError, EvaluationData, MetaFeatureTable, PerformanceTable, TaskId};

/// Names of the synthetic hyperparameter columns.
pub const PARAM_NAMES: [&str; 2] = ["svc__gamma", "svc__C"];

/// Names of the synthetic meta-feature columns.
pub const METAFEATURE_NAMES: [&str; 3] = ["optimum_gamma", "optimum_C", "NumberOfInstances"];

/// Random features in `[-1, 1]` with a smooth, mostly-quadratic response.
///
/// Returns `(x, y)` with `x` of shape `[n_rows, n_features]`.
pub fn smooth_response_surface(
	n_rows: usize,
	n_features: usize,
	seed: u64,
) -> (Array2<f64>, Array1<f64>) {
	let mut rng = StdRng::seed_from_u64(seed);
	let weights: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>() * 2.0 - 1.0).collect();

	let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.r#gen::<f64>() * 2.0 - 1.0);
	let y = x
		.outer_iter()
		.map(|row| {
			let linear: f64 = row.iter().zip(&weights).map(|(v, w)| v * w).sum();
			let bowl: f64 = row.iter().map(|v| v * v).sum();
			linear - 0.5 * bowl
		})
		.collect();
	(x, y)
}

/// Performance and meta-feature tables for `n_tasks` tasks.
///
/// Task ids are `1..=n_tasks`. Every task has `rows_per_task` random
/// configurations in log-space, scored by a bowl-shaped accuracy surface
/// whose optimum depends on the task. The optimum is exposed through the
/// meta-features, so strategies using them have something to learn from.
/// Task 1 has a missing `NumberOfInstances` (NaN) to exercise imputation.
///
/// All rows carry `svc__kernel = "rbf"`.
pub fn synthetic_tables(
	n_tasks: usize,
	rows_per_task: usize,
	seed: u64,
) -> Result<(PerformanceTable, MetaFeatureTable), DataError> {
	let mut rng = StdRng::seed_from_u64(seed);
	let n_rows = n_tasks * rows_per_task;

	let mut meta = MetaFeatureTable::new(METAFEATURE_NAMES.iter().map(|s| s.to_string()).collect());
	let mut task_ids = Vec::with_capacity(n_rows);
	let mut params = Array2::zeros((n_rows, PARAM_NAMES.len()));
	let mut targets = Array1::zeros(n_rows);

	for t in 0..n_tasks {
		let task_id = TaskId(t as u32 + 1);
		let opt_gamma = rng.r#gen::<f64>() * 6.0 - 3.0;
		let opt_c = rng.r#gen::<f64>() * 6.0 - 3.0;
		let n_instances = if t == 0 {
			f64::NAN
		} else {
			(100.0 + rng.r#gen::<f64>() * 10_000.0).round()
		};
		meta.insert(task_id, vec![opt_gamma, opt_c, n_instances])?;

		for r in 0..rows_per_task {
			let row = t * rows_per_task + r;
			let gamma = rng.r#gen::<f64>() * 10.0 - 5.0;
			let c = rng.r#gen::<f64>() * 10.0 - 5.0;
			let noise = (rng.r#gen::<f64>() * 2.0 - 1.0) * 0.005;
			task_ids.push(task_id);
			params[[row, 0]] = gamma;
			params[[row, 1]] = c;
			targets[row] =
				0.9 - 0.01 * ((gamma - opt_gamma).powi(2) + (c - opt_c).powi(2)) + noise;
		}
	}

	let performances = PerformanceTable::new(
		PARAM_NAMES.iter().map(|s| s.to_string()).collect(),
		task_ids,
		params,
		targets,
	)?
	.with_category("svc__kernel", vec![Some("rbf".to_string()); n_rows])?;
	Ok((performances, meta))
}

/// [`synthetic_tables`] joined, with missing meta-features imputed as `-1`.
pub fn synthetic_evaluation_data(
	n_tasks: usize,
	rows_per_task: usize,
	seed: u64,
) -> Result<EvaluationData, DataError> {
	let (performances, meta) = synthetic_tables(n_tasks, rows_per_task, seed)?;
	EvaluationData::join(performances, meta.impute_missing(-1.0))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn synthetic_data_is_deterministic() {
		let a = synthetic_evaluation_data(3, 20, 7).unwrap();
		let b = synthetic_evaluation_data(3, 20, 7).unwrap();
		assert_eq!(a.performances(), b.performances());
		assert_eq!(a.tasks(), vec![TaskId(1), TaskId(2), TaskId(3)]);
	}

	#[test]
	fn first_task_metafeatures_are_imputed() {
		let data = synthetic_evaluation_data(2, 5, 1).unwrap();
		assert_eq!(data.metafeatures().get(TaskId(1)).unwrap()[2], -1.0);
	}

	#[test]
	fn response_surface_shapes() {
		let (x, y) = smooth_response_surface(30, 4, 2);
		assert_eq!(x.dim(), (30, 4));
		assert_eq!(y.len(), 30);
		assert!(x.iter().all(|v| (-1.0..=1.0).contains(v)));
	}
}
