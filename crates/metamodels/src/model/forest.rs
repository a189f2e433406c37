//! Random forest surrogate.
//!
//! Each tree is grown on a bootstrap sample of the training rows with its own
//! random stream, derived from the configured seed and the tree index. Trees
//! are independent of each other, so growing them in parallel produces the
//! same forest as growing them sequentially.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_data, FitError, ForestConfig, Surrogate};
use crate::utils::Parallelism;

/// Odd constant used to spread per-tree seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Bagged ensemble of regression trees. Predictions are the tree average.
#[derive(Debug, Clone)]
pub struct RandomForestSurrogate {
    config: ForestConfig,
    parallelism: Parallelism,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestSurrogate {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            parallelism: Parallelism::Sequential,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Grow trees in parallel when allowed.
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fitted trees (empty before the first fit).
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    fn tree_seed(&self, tree_idx: usize) -> u64 {
        self.config
            .seed
            .wrapping_add((tree_idx as u64 + 1).wrapping_mul(SEED_STRIDE))
    }
}

impl Default for RandomForestSurrogate {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl Surrogate for RandomForestSurrogate {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), FitError> {
        self.trees.clear();
        self.n_features = 0;
        check_training_data(x, y)?;

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            n_split_features: ((self.config.max_features * n_features as f64).ceil() as usize)
                .clamp(1, n_features.max(1)),
        };

        let trees = self.parallelism.maybe_par_map(0..self.config.n_trees, |t| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.tree_seed(t));
            let sample: Vec<usize> = if self.config.bootstrap {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            RegressionTree::grow(x, y, sample, &params, &mut rng)
        });

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        if self.trees.is_empty() {
            return Err(FitError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(FitError::FeatureCountMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}
