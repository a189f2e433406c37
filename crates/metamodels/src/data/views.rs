//! Feature views: how configuration parameters become a feature matrix.
//!
//! A view is derived on demand for a set of rows and never stored. Meta views
//! append, to every row, the meta-feature vector of the task the row belongs to.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{DataError, EvaluationData};

/// Named transformation of configuration parameters into features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureView {
    /// Raw hyperparameter values.
    Raw,
    /// Polynomial expansion of the hyperparameters (no bias column).
    Polynomial,
    /// Raw hyperparameters followed by the task's meta-features.
    RawMeta,
    /// Polynomial expansion followed by the task's meta-features.
    PolynomialMeta,
}

impl FeatureView {
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Polynomial => "polynomial",
            Self::RawMeta => "raw_meta",
            Self::PolynomialMeta => "polynomial_meta",
        }
    }

    pub fn is_polynomial(self) -> bool {
        matches!(self, Self::Polynomial | Self::PolynomialMeta)
    }

    pub fn uses_metafeatures(self) -> bool {
        matches!(self, Self::RawMeta | Self::PolynomialMeta)
    }

    /// Number of output columns for `n_params` parameters.
    pub fn n_outputs(self, n_params: usize, n_metafeatures: usize, degree: usize) -> usize {
        let base = if self.is_polynomial() {
            n_polynomial_outputs(n_params, degree)
        } else {
            n_params
        };
        if self.uses_metafeatures() {
            base + n_metafeatures
        } else {
            base
        }
    }

    /// Build the feature matrix for `rows` of `data`.
    ///
    /// `degree` is only used by polynomial views.
    pub fn build(
        self,
        data: &EvaluationData,
        rows: &[usize],
        degree: usize,
    ) -> Result<Array2<f64>, DataError> {
        let params = data.performances().params().select(Axis(0), rows);
        let base = if self.is_polynomial() {
            if degree == 0 {
                return Err(DataError::InvalidDegree);
            }
            polynomial_features(params.view(), degree)
        } else {
            params
        };

        if !self.uses_metafeatures() {
            return Ok(base);
        }

        let n_base = base.ncols();
        let n_meta = data.metafeatures().n_features();
        let mut out = Array2::zeros((rows.len(), n_base + n_meta));
        for (i, &row) in rows.iter().enumerate() {
            let meta = data.row_metafeatures(row)?;
            let mut out_row = out.row_mut(i);
            for (j, &v) in base.row(i).iter().enumerate() {
                out_row[j] = v;
            }
            for (j, &v) in meta.iter().enumerate() {
                out_row[n_base + j] = v;
            }
        }
        Ok(out)
    }
}

// =============================================================================
// Polynomial Expansion
// =============================================================================

/// Number of monomials of degree `1..=degree` in `n_inputs` variables.
pub fn n_polynomial_outputs(n_inputs: usize, degree: usize) -> usize {
    monomials(n_inputs, degree).len()
}

/// Expand `x` into all monomials of degree `1..=degree`, without bias.
///
/// Columns are ordered by degree, then lexicographically by the indices of
/// the multiplied inputs. For inputs `[a, b]` and degree 2 the output is
/// `[a, b, a², ab, b²]`.
pub fn polynomial_features(x: ArrayView2<'_, f64>, degree: usize) -> Array2<f64> {
    let terms = monomials(x.ncols(), degree);
    let mut out = Array2::zeros((x.nrows(), terms.len()));
    for (r, row) in x.outer_iter().enumerate() {
        for (c, term) in terms.iter().enumerate() {
            out[[r, c]] = term.iter().map(|&i| row[i]).product();
        }
    }
    out
}

/// Input indices of every monomial, graded lexicographic order.
fn monomials(n_inputs: usize, degree: usize) -> Vec<Vec<usize>> {
    let mut terms = Vec::new();
    for d in 1..=degree {
        let mut current = Vec::with_capacity(d);
        combinations_with_replacement(n_inputs, d, 0, &mut current, &mut terms);
    }
    terms
}

fn combinations_with_replacement(
    n: usize,
    remaining: usize,
    start: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        combinations_with_replacement(n, remaining - 1, i, current, out);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MetaFeatureTable, PerformanceTable, TaskId};
    use ndarray::array;

    #[test]
    fn quadratic_expansion_order() {
        let x = array![[2.0, 3.0]];
        let poly = polynomial_features(x.view(), 2);
        assert_eq!(poly, array![[2.0, 3.0, 4.0, 6.0, 9.0]]);
    }

    #[test]
    fn cubic_expansion_size() {
        // 3 + 6 + 10 monomials of degree 1, 2 and 3 in three variables
        assert_eq!(n_polynomial_outputs(3, 3), 19);
        let x = array![[1.0, 2.0, 3.0]];
        let poly = polynomial_features(x.view(), 3);
        assert_eq!(poly.ncols(), 19);
        // Last term is x2^3
        assert_eq!(poly[[0, 18]], 27.0);
    }

    #[test]
    fn degree_one_is_identity() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(polynomial_features(x.view(), 1), x);
    }

    #[test]
    fn meta_view_appends_row_task_metafeatures() {
        let table = PerformanceTable::new(
            vec!["a".into(), "b".into()],
            vec![TaskId(1), TaskId(2)],
            array![[1.0, 2.0], [3.0, 4.0]],
            array![0.1, 0.2],
        )
        .unwrap();
        let mut meta = MetaFeatureTable::new(vec!["m".into()]);
        meta.insert(TaskId(1), vec![10.0]).unwrap();
        meta.insert(TaskId(2), vec![20.0]).unwrap();
        let data = EvaluationData::join(table, meta).unwrap();

        let raw_meta = FeatureView::RawMeta.build(&data, &[1, 0], 2).unwrap();
        assert_eq!(raw_meta, array![[3.0, 4.0, 20.0], [1.0, 2.0, 10.0]]);

        let poly_meta = FeatureView::PolynomialMeta.build(&data, &[0], 2).unwrap();
        assert_eq!(poly_meta, array![[1.0, 2.0, 1.0, 2.0, 4.0, 10.0]]);
        assert_eq!(FeatureView::PolynomialMeta.n_outputs(2, 1, 2), 6);
    }
}
