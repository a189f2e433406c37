//! One train/test fold: fit, predict both sides, score both sides.

use ndarray::{ArrayView1, ArrayView2};

use super::error::FoldError;
use super::metrics::{score, RankingScore};
use crate::model::Surrogate;

/// Scores of one fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldScores {
    /// Scored on the held-out rows.
    pub test: RankingScore,
    /// Scored on the rows the model was fitted on.
    pub train: RankingScore,
}

/// Fit `surrogate` on the training rows and score its rankings of both the
/// training rows and the test rows.
///
/// `surrogate` is refitted from scratch; whatever it learned before is
/// discarded.
pub fn evaluate_fold<S: Surrogate + ?Sized>(
    surrogate: &mut S,
    train_x: ArrayView2<'_, f64>,
    train_y: ArrayView1<'_, f64>,
    test_x: ArrayView2<'_, f64>,
    test_y: ArrayView1<'_, f64>,
    n: usize,
    k: usize,
) -> Result<FoldScores, FoldError> {
    surrogate.fit(train_x, train_y).map_err(FoldError::Fit)?;
    let test_pred = surrogate.predict(test_x).map_err(FoldError::Predict)?;
    let train_pred = surrogate.predict(train_x).map_err(FoldError::Predict)?;

    let test = score(&test_y.to_vec(), &test_pred.to_vec(), n, k)
        .map_err(|source| FoldError::Metric { side: "test", source })?;
    let train = score(&train_y.to_vec(), &train_pred.to_vec(), n, k)
        .map_err(|source| FoldError::Metric { side: "train", source })?;
    Ok(FoldScores { test, train })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::MetricError;
    use crate::model::{FitError, LinearSurrogate};
    use ndarray::{array, Array1, Array2};

    #[test]
    fn linear_data_is_ranked_perfectly() {
        let train_x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let train_y: Array1<f64> = train_x.column(0).mapv(|v| 3.0 * v + 1.0);
        let test_x = array![[2.5], [7.5], [0.5], [9.5]];
        let test_y = test_x.column(0).mapv(|v| 3.0 * v + 1.0);

        let mut model = LinearSurrogate::default();
        let scores = evaluate_fold(
            &mut model,
            train_x.view(),
            train_y.view(),
            test_x.view(),
            test_y.view(),
            2,
            4,
        )
        .unwrap();
        assert_eq!(scores.test.precision, 1.0);
        assert_eq!(scores.train.precision, 1.0);
        assert!((scores.test.correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_training_row_fails_to_fit() {
        let train_x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let train_y = array![0.1, 0.2, 0.3];
        let mut model = LinearSurrogate::default();
        let err = evaluate_fold(
            &mut model,
            train_x.view(),
            train_y.view(),
            train_x.view(),
            train_y.view(),
            1,
            3,
        )
        .unwrap_err();
        assert_eq!(err, FoldError::Fit(FitError::TooFewDistinctRows { distinct: 1 }));
    }

    #[test]
    fn window_larger_than_test_fold_is_reported() {
        let train_x = array![[0.0], [1.0], [2.0], [3.0]];
        let train_y = array![0.0, 1.0, 2.0, 3.0];
        let test_x = array![[1.5]];
        let test_y = array![1.5];
        let mut model = LinearSurrogate::default();
        let err = evaluate_fold(
            &mut model,
            train_x.view(),
            train_y.view(),
            test_x.view(),
            test_y.view(),
            2,
            4,
        )
        .unwrap_err();
        assert_eq!(
            err,
            FoldError::Metric {
                side: "test",
                source: MetricError::WindowLargerThanPool { n: 2, pool: 1 }
            }
        );
    }
}
