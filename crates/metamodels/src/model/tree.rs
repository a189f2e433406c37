//! Regression tree representation (SoA) and CART growth.
//!
//! This module provides:
//! - [`RegressionTree`]: Immutable SoA tree storage for traversal
//! - [`TreeParams`]: Growth limits
//! - [`RegressionTree::grow`]: Greedy squared-error splitting over a sample
//!
//! Numeric splits send a row left when `x[feature] <= threshold`.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;

/// Node index within a tree.
pub type NodeId = u32;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features examined per split.
    pub n_split_features: usize,
}

/// Immutable regression tree in structure-of-arrays layout.
///
/// Node 0 is the root. For leaves, `split_index`, `threshold` and the child
/// arrays hold placeholder values and must not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    split_index: Vec<u32>,
    threshold: Vec<f64>,
    left: Vec<NodeId>,
    right: Vec<NodeId>,
    is_leaf: Vec<bool>,
    leaf_value: Vec<f64>,
}

impl RegressionTree {
    /// A tree with a single leaf.
    pub fn constant(value: f64) -> Self {
        Self {
            split_index: vec![0],
            threshold: vec![0.0],
            left: vec![0],
            right: vec![0],
            is_leaf: vec![true],
            leaf_value: vec![value],
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Depth of the deepest leaf (root-only tree has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeId, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            let n = node as usize;
            if self.is_leaf[n] {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left[n], depth + 1));
                stack.push((self.right[n], depth + 1));
            }
        }
        max_depth
    }

    /// Predict a single row.
    #[inline]
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = 0usize;
        while !self.is_leaf[node] {
            let feature = self.split_index[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.leaf_value[node]
    }

    /// Grow a tree on the rows listed in `sample` (duplicates allowed, as
    /// produced by bootstrapping).
    pub fn grow<R: Rng>(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        sample: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = TreeBuilder {
            x: x.view(),
            y: y.view(),
            params,
            tree: RegressionTree {
                split_index: Vec::new(),
                threshold: Vec::new(),
                left: Vec::new(),
                right: Vec::new(),
                is_leaf: Vec::new(),
                leaf_value: Vec::new(),
            },
            features: (0..x.ncols()).collect(),
            order: Vec::new(),
        };

        let root = builder.push_leaf(mean(y, &sample));
        let mut pending = vec![(root, sample, 0usize)];
        while let Some((node, rows, depth)) = pending.pop() {
            if let Some(split) = builder.find_split(&rows, depth, rng) {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .copied()
                    .partition(|&r| x[[r, split.feature]] <= split.threshold);
                let left = builder.push_leaf(mean(y, &left_rows));
                let right = builder.push_leaf(mean(y, &right_rows));
                builder.make_split(node, &split, left, right);
                pending.push((right, right_rows, depth + 1));
                pending.push((left, left_rows, depth + 1));
            }
        }
        builder.tree
    }
}

// =============================================================================
// Growth
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: &'a TreeParams,
    tree: RegressionTree,
    /// Feature indices, shuffled in place when subsampling.
    features: Vec<usize>,
    /// Scratch buffer for sorting node rows.
    order: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn push_leaf(&mut self, value: f64) -> NodeId {
        let id = self.tree.is_leaf.len() as NodeId;
        self.tree.split_index.push(0);
        self.tree.threshold.push(0.0);
        self.tree.left.push(0);
        self.tree.right.push(0);
        self.tree.is_leaf.push(true);
        self.tree.leaf_value.push(value);
        id
    }

    fn make_split(&mut self, node: NodeId, split: &Split, left: NodeId, right: NodeId) {
        let n = node as usize;
        self.tree.split_index[n] = split.feature as u32;
        self.tree.threshold[n] = split.threshold;
        self.tree.left[n] = left;
        self.tree.right[n] = right;
        self.tree.is_leaf[n] = false;
    }

    /// Best squared-error split of `rows`, or `None` if the node stays a leaf.
    fn find_split<R: Rng>(&mut self, rows: &[usize], depth: usize, rng: &mut R) -> Option<Split> {
        let params = self.params;
        let n = rows.len();
        if self.features.is_empty()
            || n < params.min_samples_split
            || n < 2 * params.min_samples_leaf
        {
            return None;
        }
        if params.max_depth.is_some_and(|d| depth >= d) {
            return None;
        }
        let first = self.y[rows[0]];
        if rows.iter().all(|&r| self.y[r] == first) {
            return None;
        }

        let total: f64 = rows.iter().map(|&r| self.y[r]).sum();
        let parent_score = total * total / n as f64;

        let n_candidates = params.n_split_features.clamp(1, self.features.len());
        if n_candidates < self.features.len() {
            self.features.shuffle(rng);
        }

        let mut best: Option<(f64, Split)> = None;
        for fi in 0..n_candidates {
            let feature = self.features[fi];
            self.order.clear();
            self.order.extend_from_slice(rows);
            let x = self.x;
            self.order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            for i in 1..n {
                left_sum += self.y[self.order[i - 1]];
                let lo = x[[self.order[i - 1], feature]];
                let hi = x[[self.order[i], feature]];
                if lo == hi || i < params.min_samples_leaf || n - i < params.min_samples_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / i as f64 + right_sum * right_sum / (n - i) as f64;
                if best.map_or(true, |(s, _)| score > s) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some((score, Split { feature, threshold }));
                }
            }
        }

        // Keep the node a leaf when no split reduces the squared error.
        best.filter(|(score, _)| *score > parent_score * (1.0 + 1e-12))
            .map(|(_, split)| split)
    }
}

fn mean(y: ArrayView1<'_, f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}
