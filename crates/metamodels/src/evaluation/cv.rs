//! K-fold cross-validation of a surrogate within one task.
//!
//! Rows are shuffled with an explicit seed and dealt to folds round-robin,
//! so fold sizes differ by at most one and the same seed always yields the
//! same folds. A single fold trains and tests on all rows.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::error::CvError;
use super::fold::{evaluate_fold, FoldScores};
use crate::model::Surrogate;

/// Mean of a per-fold score that may be undefined in some folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanScore {
    /// Mean over the folds where the score was defined; `None` if it was
    /// undefined everywhere.
    pub mean: Option<f64>,
    /// Number of folds that contributed to `mean`.
    pub n_defined: usize,
}

impl MeanScore {
    fn from_folds(values: impl Iterator<Item = Option<f64>>) -> Self {
        let defined: Vec<f64> = values.flatten().collect();
        let mean = if defined.is_empty() {
            None
        } else {
            Some(defined.iter().sum::<f64>() / defined.len() as f64)
        };
        Self {
            mean,
            n_defined: defined.len(),
        }
    }
}

/// Fold-averaged scores.
#[derive(Debug, Clone, PartialEq)]
pub struct CvScores {
    pub test_precision: f64,
    pub train_precision: f64,
    pub test_correlation: MeanScore,
    pub train_correlation: MeanScore,
    /// Scores of each fold, in fold order.
    pub folds: Vec<FoldScores>,
}

impl CvScores {
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Fold index of each row.
///
/// # Errors
///
/// `fold_count` must be at least 1 and at most `n_rows`.
pub fn assign_folds(n_rows: usize, fold_count: usize, seed: u64) -> Result<Vec<usize>, CvError> {
    if fold_count == 0 {
        return Err(CvError::ZeroFolds);
    }
    if n_rows < fold_count {
        return Err(CvError::TooFewRows {
            rows: n_rows,
            folds: fold_count,
        });
    }
    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut folds = vec![0; n_rows];
    for (position, &row) in order.iter().enumerate() {
        folds[row] = position % fold_count;
    }
    Ok(folds)
}

/// Cross-validate `surrogate` on `(x, y)` with `fold_count` folds.
///
/// Each fold is scored with [`evaluate_fold`]; precision is averaged over
/// all folds and correlation over the folds where it is defined. With
/// `fold_count == 1` the single fold trains and tests on every row.
pub fn cross_validate_surrogate<S: Surrogate + ?Sized>(
    surrogate: &mut S,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    fold_count: usize,
    n: usize,
    k: usize,
    seed: u64,
) -> Result<CvScores, CvError> {
    let n_rows = x.nrows();
    let mut folds = Vec::with_capacity(fold_count);

    if fold_count == 1 {
        if n_rows == 0 {
            return Err(CvError::TooFewRows { rows: 0, folds: 1 });
        }
        let scores = evaluate_fold(&mut *surrogate, x, y, x, y, n, k)
            .map_err(|source| CvError::Fold { fold: 0, source })?;
        folds.push(scores);
    } else {
        let assignment = assign_folds(n_rows, fold_count, seed)?;
        for fold in 0..fold_count {
            let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
                (0..n_rows).partition(|&r| assignment[r] == fold);

            let train_x = x.select(Axis(0), &train_rows);
            let train_y = y.select(Axis(0), &train_rows);
            let test_x = x.select(Axis(0), &test_rows);
            let test_y = y.select(Axis(0), &test_rows);

            let scores = evaluate_fold(
                &mut *surrogate,
                train_x.view(),
                train_y.view(),
                test_x.view(),
                test_y.view(),
                n,
                k,
            )
            .map_err(|source| CvError::Fold { fold, source })?;
            folds.push(scores);
        }
    }

    let n_folds = folds.len() as f64;
    Ok(CvScores {
        test_precision: folds.iter().map(|f| f.test.precision).sum::<f64>() / n_folds,
        train_precision: folds.iter().map(|f| f.train.precision).sum::<f64>() / n_folds,
        test_correlation: MeanScore::from_folds(folds.iter().map(|f| f.test.correlation)),
        train_correlation: MeanScore::from_folds(folds.iter().map(|f| f.train.correlation)),
        folds,
    })
}
