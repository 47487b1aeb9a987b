//! Regression tree used as the gradient-boosting base learner
//!
//! Squared-error splits with L2-regularised leaf weights: a node with
//! residual sum `G` over `n` rows has weight `G / (n + lambda)` and split gain
//! `G_L²/(n_L+λ) + G_R²/(n_R+λ) - G²/(n+λ)`.

use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64 },
    /// Internal node: rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub reg_lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            reg_lambda: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Fit on the subset `rows` of `x`, considering only the columns in `features`.
    /// Feature indices in the fitted tree refer to columns of `x`.
    pub fn fit(
        x: &[Vec<f64>],
        targets: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let root = build_node(x, targets, rows, features, params, 0);
        Self { root }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        node_depth(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        count_leaves(&self.root)
    }
}

fn leaf_weight(sum: f64, count: usize, lambda: f64) -> f64 {
    sum / (count as f64 + lambda)
}

fn score(sum: f64, count: usize, lambda: f64) -> f64 {
    sum * sum / (count as f64 + lambda)
}

fn build_node(
    x: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
    depth: usize,
) -> TreeNode {
    let sum: f64 = rows.iter().map(|&r| targets[r]).sum();
    let leaf = TreeNode::Leaf {
        value: leaf_weight(sum, rows.len(), params.reg_lambda),
    };

    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || rows.len() < 2 * min_leaf {
        return leaf;
    }

    let Some(split) = find_best_split(x, targets, rows, features, params, sum) else {
        return leaf;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| x[r][split.feature] <= split.threshold);

    TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(build_node(x, targets, &left_rows, features, params, depth + 1)),
        right: Box::new(build_node(x, targets, &right_rows, features, params, depth + 1)),
    }
}

fn find_best_split(
    x: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
    total: f64,
) -> Option<BestSplit> {
    let n = rows.len();
    let min_leaf = params.min_samples_leaf.max(1);
    let lambda = params.reg_lambda;
    let parent = score(total, n, lambda);

    let mut best: Option<BestSplit> = None;
    let mut order = rows.to_vec();

    for &feature in features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for i in 1..n {
            left_sum += targets[order[i - 1]];

            let lo = x[order[i - 1]][feature];
            let hi = x[order[i]][feature];
            if lo == hi || i < min_leaf || n - i < min_leaf {
                continue;
            }

            let gain = score(left_sum, i, lambda) + score(total - left_sum, n - i, lambda) - parent;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: lo + (hi - lo) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}
