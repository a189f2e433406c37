//! Ranking metrics: precision-at-N-out-of-K and Spearman correlation.
//!
//! Both metrics are computed over a *pool*: the `k` items with the highest
//! true values (or all items, if fewer than `k` exist). Restricting to the
//! pool focuses the score on how well a surrogate orders the good
//! configurations, which are the ones a configuration search cares about.
//!
//! # Ties
//!
//! Selections are deterministic. Items with equal values are ordered by
//! their position in the input: of two equally scored items, the one that
//! appears first ranks higher. The same inputs therefore always produce the
//! same score.
//!
//! Spearman correlation uses average ranks for tied values, and is undefined
//! (`None`) when fewer than two items are in the pool or when either side has
//! no spread.

use std::collections::HashSet;

use crate::utils::{argsort_desc, average_ranks};

// =============================================================================
// Types
// =============================================================================

/// Scores of a predicted ranking against the true one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingScore {
    /// Fraction of the true top-n (within the pool) also in the predicted top-n.
    pub precision: f64,
    /// Spearman correlation over the pool; `None` when undefined.
    pub correlation: Option<f64>,
}

/// Precondition violations of [`score`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("true values have length {true_len} but predictions have length {predicted_len}")]
    LengthMismatch {
        true_len: usize,
        predicted_len: usize,
    },

    #[error("cannot score an empty ranking")]
    Empty,

    #[error("precision window n must be at least 1")]
    ZeroWindow,

    #[error("pool size k must be at least 1")]
    ZeroPool,

    #[error("precision window {n} is larger than the pool of {pool} items")]
    WindowLargerThanPool { n: usize, pool: usize },

    #[error("non-finite {which} value at index {index}")]
    NonFinite { which: &'static str, index: usize },
}

// =============================================================================
// Scoring
// =============================================================================

/// Score `predicted_values` against `true_values`.
///
/// The pool holds the `min(k, len)` items with the highest true values.
/// `precision` is `|true top-n ∩ predicted top-n| / n`, where both top-n sets
/// are taken within the pool. `correlation` is Spearman's rho between true
/// and predicted values of the pool items.
///
/// # Errors
///
/// - lengths differ, or inputs are empty
/// - `n == 0` or `k == 0`
/// - `n` is larger than the pool
/// - any value is NaN or infinite
pub fn score(
    true_values: &[f64],
    predicted_values: &[f64],
    n: usize,
    k: usize,
) -> Result<RankingScore, MetricError> {
    let pool = pool_indices(true_values, predicted_values, n, k)?;
    Ok(RankingScore {
        precision: precision_in_pool(true_values, predicted_values, &pool, n),
        correlation: spearman_in_pool(true_values, predicted_values, &pool),
    })
}

/// Precision-at-`n`-out-of-`k` only. See [`score`].
pub fn precision_at_n_out_of_k(
    true_values: &[f64],
    predicted_values: &[f64],
    n: usize,
    k: usize,
) -> Result<f64, MetricError> {
    let pool = pool_indices(true_values, predicted_values, n, k)?;
    Ok(precision_in_pool(true_values, predicted_values, &pool, n))
}

/// Spearman rank correlation of two equally long slices.
///
/// Returns `None` if fewer than two values are given or if either slice is
/// constant.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);

    let mean = (n + 1) as f64 / 2.0;
    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for i in 0..n {
        let dx = rx[i] - mean;
        let dy = ry[i] - mean;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    if den_x == 0.0 || den_y == 0.0 {
        None
    } else {
        Some((num / (den_x.sqrt() * den_y.sqrt())).clamp(-1.0, 1.0))
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Validate inputs and return the pool, sorted by original index.
fn pool_indices(
    true_values: &[f64],
    predicted_values: &[f64],
    n: usize,
    k: usize,
) -> Result<Vec<usize>, MetricError> {
    if true_values.len() != predicted_values.len() {
        return Err(MetricError::LengthMismatch {
            true_len: true_values.len(),
            predicted_len: predicted_values.len(),
        });
    }
    if true_values.is_empty() {
        return Err(MetricError::Empty);
    }
    if n == 0 {
        return Err(MetricError::ZeroWindow);
    }
    if k == 0 {
        return Err(MetricError::ZeroPool);
    }
    let pool_size = k.min(true_values.len());
    if n > pool_size {
        return Err(MetricError::WindowLargerThanPool { n, pool: pool_size });
    }
    if let Some(index) = true_values.iter().position(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite {
            which: "true",
            index,
        });
    }
    if let Some(index) = predicted_values.iter().position(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite {
            which: "predicted",
            index,
        });
    }

    let mut pool = argsort_desc(true_values);
    pool.truncate(pool_size);
    pool.sort_unstable();
    Ok(pool)
}

fn precision_in_pool(
    true_values: &[f64],
    predicted_values: &[f64],
    pool: &[usize],
    n: usize,
) -> f64 {
    let true_top: HashSet<usize> = top_n(true_values, pool, n).collect();
    let hits = top_n(predicted_values, pool, n)
        .filter(|i| true_top.contains(i))
        .count();
    hits as f64 / n as f64
}

/// The `n` pool items with the highest `values`; ties go to the lower index.
fn top_n<'a>(values: &[f64], pool: &'a [usize], n: usize) -> impl Iterator<Item = usize> + 'a {
    let pool_values: Vec<f64> = pool.iter().map(|&i| values[i]).collect();
    argsort_desc(&pool_values)
        .into_iter()
        .take(n)
        .map(move |p| pool[p])
}

fn spearman_in_pool(true_values: &[f64], predicted_values: &[f64], pool: &[usize]) -> Option<f64> {
    let t: Vec<f64> = pool.iter().map(|&i| true_values[i]).collect();
    let p: Vec<f64> = pool.iter().map(|&i| predicted_values[i]).collect();
    spearman(&t, &p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[test]
    fn reversed_ranking_scores_zero_and_minus_one() {
        let truth = [0.9, 0.8, 0.7, 0.6, 0.5];
        let pred = [0.5, 0.6, 0.7, 0.8, 0.9];
        let s = score(&truth, &pred, 2, 5).unwrap();
        assert_eq!(s.precision, 0.0);
        assert_abs_diff_eq!(s.correlation.unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_surrogate_is_perfect() {
        let truth = [0.3, 0.9, 0.1, 0.5, 0.7, 0.2];
        let s = score(&truth, &truth, 3, 6).unwrap();
        assert_eq!(s.precision, 1.0);
        assert_abs_diff_eq!(s.correlation.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn monotone_transform_keeps_perfect_correlation() {
        let truth = [0.1, 0.4, 0.2, 0.8];
        let pred: Vec<f64> = truth.iter().map(|v| v * 10.0 - 3.0).collect();
        let s = score(&truth, &pred, 2, 4).unwrap();
        assert_eq!(s.precision, 1.0);
        assert_abs_diff_eq!(s.correlation.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pool_excludes_items_outside_top_k() {
        // Pool is indices {0, 1, 2}; index 3 has the highest prediction but
        // is not in the pool, so it can't steal a predicted top-1 slot.
        let truth = [0.9, 0.8, 0.7, 0.1];
        let pred = [0.5, 0.6, 0.4, 1.0];
        let s = score(&truth, &pred, 1, 3).unwrap();
        assert_eq!(s.precision, 0.0);
        let s = score(&truth, &pred, 2, 3).unwrap();
        assert_eq!(s.precision, 1.0);
    }

    #[test]
    fn k_larger_than_input_uses_everything() {
        let truth = [0.2, 0.4, 0.6];
        let pred = [0.1, 0.3, 0.2];
        let s = score(&truth, &pred, 1, 100).unwrap();
        assert_eq!(s.precision, 0.0);
        assert_abs_diff_eq!(s.correlation.unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn ties_resolve_by_input_order() {
        // All predictions equal: predicted top-2 are the first two pool items
        // by input position, i.e. indices 0 and 1.
        let truth = [0.1, 0.2, 0.9, 0.8];
        let pred = [0.5, 0.5, 0.5, 0.5];
        assert_eq!(precision_at_n_out_of_k(&truth, &pred, 2, 4).unwrap(), 0.0);

        let truth = [0.9, 0.8, 0.1, 0.2];
        assert_eq!(precision_at_n_out_of_k(&truth, &pred, 2, 4).unwrap(), 1.0);
    }

    #[test]
    fn tied_true_values_enter_pool_by_input_order() {
        // Pool of 2 out of three equal true values: indices 0 and 1
        let truth = [0.5, 0.5, 0.5];
        let pred = [0.0, 0.1, 0.9];
        assert_eq!(precision_at_n_out_of_k(&truth, &pred, 1, 2).unwrap(), 0.0);
    }

    #[test]
    fn constant_predictions_have_undefined_correlation() {
        let s = score(&[0.1, 0.2, 0.3], &[1.0, 1.0, 1.0], 1, 3).unwrap();
        assert_eq!(s.correlation, None);
    }

    #[test]
    fn single_item_pool_has_undefined_correlation() {
        let s = score(&[0.1, 0.2, 0.3], &[0.3, 0.2, 0.1], 1, 1).unwrap();
        assert_eq!(s.precision, 1.0);
        assert_eq!(s.correlation, None);
    }

    #[rstest]
    #[case(
        &[1.0, 2.0],
        &[1.0],
        1,
        1,
        MetricError::LengthMismatch { true_len: 2, predicted_len: 1 }
    )]
    #[case(&[], &[], 1, 1, MetricError::Empty)]
    #[case(&[1.0], &[1.0], 0, 1, MetricError::ZeroWindow)]
    #[case(&[1.0], &[1.0], 1, 0, MetricError::ZeroPool)]
    #[case(
        &[1.0, 2.0, 3.0],
        &[1.0, 2.0, 3.0],
        3,
        2,
        MetricError::WindowLargerThanPool { n: 3, pool: 2 }
    )]
    #[case(&[1.0, 2.0], &[1.0, 2.0], 3, 10, MetricError::WindowLargerThanPool { n: 3, pool: 2 })]
    #[case(&[1.0, f64::NAN], &[1.0, 2.0], 1, 2, MetricError::NonFinite { which: "true", index: 1 })]
    #[case(
        &[1.0, 2.0],
        &[f64::INFINITY, 2.0],
        1,
        2,
        MetricError::NonFinite { which: "predicted", index: 0 }
    )]
    fn precondition_violations(
        #[case] truth: &[f64],
        #[case] pred: &[f64],
        #[case] n: usize,
        #[case] k: usize,
        #[case] expected: MetricError,
    ) {
        assert_eq!(score(truth, pred, n, k), Err(expected));
    }

    #[test]
    fn spearman_with_ties_matches_reference() {
        // scipy.stats.spearmanr([1, 2, 2, 3], [1, 3, 2, 4]) = 0.9486832980505138
        let rho = spearman(&[1.0, 2.0, 2.0, 3.0], &[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_abs_diff_eq!(rho, 0.9486832980505138, epsilon = 1e-12);
    }
}
