//! Common utilities used across the crate.
//!
//! This module provides ordering and quantile helpers, parallelism
//! configuration, and thread pool setup used by the evaluation loop and
//! the forest trainer.

use std::cmp::Ordering;

use rayon::prelude::*;

// =============================================================================
// Ordering Utilities
// =============================================================================

/// Indices of `values` sorted from highest to lowest.
///
/// The sort is stable: equal values keep their input order, so the item that
/// appears first in `values` ranks higher. Values must not be NaN.
#[inline]
pub fn argsort_desc(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal));
    order
}

/// Average ranks (1-based) of `values`, with tied values sharing the mean of
/// the ranks they span.
///
/// `[10.0, 20.0, 20.0, 30.0]` gives `[1.0, 2.5, 2.5, 4.0]`.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0usize;
    while i < n {
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Positions i..j are tied; ranks are (i+1)..=j.
        let avg = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = avg;
        }
        i = j;
    }
    ranks
}

// =============================================================================
// Statistical Utilities
// =============================================================================

/// Quantile of already sorted values with linear interpolation between the
/// two closest ranks.
///
/// Returns `f64::NAN` if `sorted` is empty.
#[inline]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// This is a simple flag passed through the evaluation loop and the forest
/// trainer. When `Parallel`, components may use `rayon` parallel iterators.
///
/// The actual thread pool is set up by [`run_with_threads`]. Components don't
/// manage thread pools, they just respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map `f` over `iter`, in parallel if allowed.
    ///
    /// Output order always matches input order.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// If a dedicated pool cannot be created the closure runs sequentially.
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    match Parallelism::from_threads(n_threads) {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
                Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
                Err(_) => f(Parallelism::Sequential),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argsort_desc_orders_highest_first() {
        let order = argsort_desc(&[0.2, 0.9, 0.5]);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_argsort_desc_ties_keep_input_order() {
        let order = argsort_desc(&[0.5, 0.7, 0.5, 0.7]);
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_average_ranks_unsorted_input() {
        let ranks = average_ranks(&[3.0, 1.0, 2.0]);
        assert_eq!(ranks, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_quantile_empty() {
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_quantile_single() {
        assert_eq!(quantile_sorted(&[42.0], 0.25), 42.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        // Positions: q=0.25 over 4 values -> 0.75 between 1.0 and 2.0
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&values, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&values, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(quantile_sorted(&values, 1.0), 4.0);
    }

    #[test]
    fn test_parallelism_from_threads() {
        assert!(!Parallelism::from_threads(1).is_parallel());
        assert!(Parallelism::from_threads(2).is_parallel());
        assert!(Parallelism::from_threads(8).is_parallel());
    }

    #[test]
    fn test_run_with_threads_sequential() {
        let result = run_with_threads(1, |p| (p, 42));
        assert_eq!(result, (Parallelism::Sequential, 42));
    }

    #[test]
    fn test_run_with_threads_explicit() {
        let result = run_with_threads(2, |_| rayon::current_num_threads());
        assert_eq!(result, 2);
    }

    #[test]
    fn test_maybe_par_map_preserves_order() {
        let result: Vec<_> = Parallelism::Sequential.maybe_par_map(0..5usize, |i| i * 2);
        assert_eq!(result, vec![0, 2, 4, 6, 8]);

        let result: Vec<_> = Parallelism::Parallel.maybe_par_map(0..5usize, |i| i * 2);
        assert_eq!(result, vec![0, 2, 4, 6, 8]);
    }
}
