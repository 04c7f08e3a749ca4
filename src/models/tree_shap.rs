//! Exact path-dependent TreeSHAP for the tree ensemble.
//!
//! Implements the polynomial-time algorithm of Lundberg et al. (2018),
//! "Consistent Individualized Feature Attribution for Tree Ensembles".
//! Node cover stands in for the background distribution, so the explainer
//! needs nothing beyond the classifier it is bound to.
//!
//! For every input, `expected_value() + shap_values(x).sum()` equals the
//! ensemble's `predict_proba(x)` (local accuracy).

use crate::error::AttributionError;
use crate::models::forest::{DecisionTree, TreeEnsemble, TreeNode};
use std::sync::Arc;

/// One entry of the unique feature path from the root to the current node.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` only for the sentinel at the root.
    feature: Option<usize>,
    /// Fraction of training samples that flow down this path when the
    /// feature is unknown.
    zero_fraction: f64,
    /// 1.0 when the explained sample flows down this path, else 0.0.
    one_fraction: f64,
    /// Permutation weight of subsets of the path.
    weight: f64,
}

/// TreeSHAP explainer bound to a shared classifier instance.
pub struct TreeShapExplainer {
    forest: Arc<TreeEnsemble>,
    expected_value: f64,
}

impl TreeShapExplainer {
    pub fn new(forest: Arc<TreeEnsemble>) -> Self {
        let expected_value = forest.expected_value();
        Self {
            forest,
            expected_value,
        }
    }

    /// The classifier this explainer attributes.
    pub fn forest(&self) -> &Arc<TreeEnsemble> {
        &self.forest
    }

    /// Mean model output over the training distribution.
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Per-feature contributions to the positive-class probability.
    pub fn shap_values(&self, features: &[f64]) -> Result<Vec<f64>, AttributionError> {
        let n_features = self.forest.n_features;
        if features.len() != n_features {
            return Err(AttributionError::ShapeMismatch {
                expected: n_features,
                actual: features.len(),
            });
        }

        let mut phi = vec![0.0; n_features];
        for tree in &self.forest.trees {
            tree_shap(tree, features, &mut phi);
        }

        let n_trees = self.forest.trees.len() as f64;
        for value in &mut phi {
            *value /= n_trees;
        }

        Ok(phi)
    }
}

fn tree_shap(tree: &DecisionTree, features: &[f64], phi: &mut [f64]) {
    let path = Vec::with_capacity(tree.max_depth() + 2);
    recurse(tree, features, phi, 0, path, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &DecisionTree,
    features: &[f64],
    phi: &mut [f64],
    node_idx: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node_idx] {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let element = path[i];
                if let Some(f) = element.feature {
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        TreeNode::Split {
            feature: split_feature,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if features[*split_feature] <= *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let hot_zero_fraction = tree.nodes[hot].cover() / cover;
            let cold_zero_fraction = tree.nodes[cold].cover() / cover;

            // A feature already on the path is undone and redone here.
            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;
            if let Some(k) = path
                .iter()
                .position(|element| element.feature == Some(*split_feature))
            {
                incoming_zero_fraction = path[k].zero_fraction;
                incoming_one_fraction = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                tree,
                features,
                phi,
                hot,
                path.clone(),
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(*split_feature),
            );
            recurse(
                tree,
                features,
                phi,
                cold,
                path,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                Some(*split_feature),
            );
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * scale / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / scale;
        } else {
            path[i].weight = path[i].weight * scale / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * scale / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64 / scale;
        } else if zero_fraction != 0.0 {
            total += (path[i].weight / zero_fraction) / ((depth - i) as f64 / scale);
        }
    }

    total
}
