//! Box-plot statistics of a metric.

use serde::{Deserialize, Serialize};

use crate::utils::quantile_sorted;

/// Five-number summary plus mean, over the defined values of a metric.
///
/// Quantiles use linear interpolation. All statistics are NaN when no value
/// is defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    /// Number of defined values.
    pub count: usize,
    /// Number of undefined values (not included in the statistics).
    pub missing: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
}

impl BoxStats {
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut defined = Vec::new();
        let mut missing = 0;
        for value in values {
            match value {
                Some(v) if v.is_finite() => defined.push(v),
                _ => missing += 1,
            }
        }
        defined.sort_by(f64::total_cmp);

        let mean = if defined.is_empty() {
            f64::NAN
        } else {
            defined.iter().sum::<f64>() / defined.len() as f64
        };
        Self {
            count: defined.len(),
            missing,
            min: defined.first().copied().unwrap_or(f64::NAN),
            q1: quantile_sorted(&defined, 0.25),
            median: quantile_sorted(&defined, 0.5),
            q3: quantile_sorted(&defined, 0.75),
            max: defined.last().copied().unwrap_or(f64::NAN),
            mean,
        }
    }
}
