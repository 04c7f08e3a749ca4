//! Tree ensemble classifier.
//!
//! A forest of binary decision trees whose leaves store the positive-class
//! (will return) probability. Every node also keeps its training cover, the
//! number of training samples that reached it, which the TreeSHAP explainer
//! uses as the path-dependent background distribution.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Relative slack allowed between a split's cover and its children's.
const COVER_TOLERANCE: f64 = 1e-6;

/// One node of a decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    /// Internal node: samples with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    /// Terminal node holding the positive-class probability.
    Leaf { value: f64, cover: f64 },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single decision tree stored as a flat node array, root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Leaf value reached by a feature vector.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaf values.
    pub fn expected_value(&self) -> f64 {
        let root_cover = self.nodes[0].cover();
        self.nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Leaf { value, cover } => Some(value * cover / root_cover),
                TreeNode::Split { .. } => None,
            })
            .sum()
    }

    /// Longest root-to-leaf path, counted in splits.
    pub fn max_depth(&self) -> usize {
        fn depth(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth(nodes, *left).max(depth(nodes, *right))
                }
            }
        }
        depth(&self.nodes, 0)
    }

    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("tree has no nodes");
        }

        let mut parents = vec![0usize; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !(cover.is_finite() && cover > 0.0) {
                bail!("node {} has invalid cover {}", idx, cover);
            }

            match node {
                TreeNode::Leaf { value, .. } => {
                    if !(0.0..=1.0).contains(value) {
                        bail!("leaf {} probability {} outside [0, 1]", idx, value);
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        bail!(
                            "node {} splits on feature {} but the model has {} features",
                            idx,
                            feature,
                            n_features
                        );
                    }
                    if !threshold.is_finite() {
                        bail!("node {} has non-finite threshold", idx);
                    }
                    // Children after their parent keeps the tree acyclic.
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            bail!("node {} has invalid child index {}", idx, child);
                        }
                    }
                    if left == right {
                        bail!("node {} has identical children", idx);
                    }
                    parents[*left] += 1;
                    parents[*right] += 1;

                    let children_cover = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (children_cover - cover).abs() > COVER_TOLERANCE * cover.max(1.0) {
                        bail!(
                            "node {} has cover {} but its children cover {}",
                            idx,
                            cover,
                            children_cover
                        );
                    }
                }
            }
        }

        // Every node but the root hangs off exactly one parent, so the
        // nodes form a single tree with nothing unreachable.
        if let Some(idx) = parents.iter().skip(1).position(|&count| count != 1) {
            bail!(
                "node {} has {} parents, expected exactly one",
                idx + 1,
                parents[idx + 1]
            );
        }

        Ok(())
    }
}

/// Random-forest style classifier: the probability is the mean of the
/// per-tree leaf probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    /// Build an ensemble, checking the structure of every tree.
    pub fn new(n_features: usize, trees: Vec<DecisionTree>) -> Result<Self> {
        let ensemble = Self { n_features, trees };
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Load an ensemble from a JSON artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read classifier from {}", path.display()))?;
        let ensemble: TreeEnsemble = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse classifier {}", path.display()))?;
        ensemble
            .validate()
            .with_context(|| format!("Invalid classifier {}", path.display()))?;

        info!(
            path = %path.display(),
            trees = ensemble.trees.len(),
            features = ensemble.n_features,
            max_depth = ensemble.max_depth(),
            "Tree ensemble loaded"
        );

        Ok(ensemble)
    }

    fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            bail!("classifier declares no features");
        }
        if self.trees.is_empty() {
            bail!("classifier has no trees");
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .with_context(|| format!("tree {}", idx))?;
        }
        Ok(())
    }

    /// Positive-class probability for a vector of `n_features` values.
    ///
    /// Callers guarantee the width; the inference engine only passes
    /// schema-aligned vectors and the service checks the schema width
    /// against `n_features` at load.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    /// Mean prediction over the training distribution.
    pub fn expected_value(&self) -> f64 {
        let sum: f64 = self.trees.iter().map(DecisionTree::expected_value).sum();
        sum / self.trees.len() as f64
    }

    pub fn max_depth(&self) -> usize {
        self.trees
            .iter()
            .map(DecisionTree::max_depth)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> TreeNode {
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            cover,
        }
    }

    pub(crate) fn leaf(value: f64, cover: f64) -> TreeNode {
        TreeNode::Leaf { value, cover }
    }

    /// Single split on feature 0 at 0.5.
    pub(crate) fn stump() -> DecisionTree {
        DecisionTree::new(vec![split(0, 0.5, 1, 2, 100.0), leaf(0.2, 50.0), leaf(0.8, 50.0)])
    }

    /// Depth-two tree over features 0 and 1 with uneven covers.
    pub(crate) fn two_level_tree() -> DecisionTree {
        DecisionTree::new(vec![
            split(0, 0.5, 1, 2, 100.0),
            split(1, 3.0, 3, 4, 60.0),
            leaf(0.9, 40.0),
            leaf(0.1, 45.0),
            leaf(0.6, 15.0),
        ])
    }

    #[test]
    fn test_tree_traversal() {
        let tree = two_level_tree();
        assert_eq!(tree.predict(&[0.0, 1.0]), 0.1);
        assert_eq!(tree.predict(&[0.0, 3.0]), 0.1);
        assert_eq!(tree.predict(&[0.0, 3.5]), 0.6);
        assert_eq!(tree.predict(&[1.0, 0.0]), 0.9);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn test_expected_value_is_cover_weighted() {
        let tree = two_level_tree();
        let expected = 0.9 * 0.40 + 0.1 * 0.45 + 0.6 * 0.15;
        assert!((tree.expected_value() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ensemble_averages_trees() {
        let ensemble = TreeEnsemble::new(2, vec![stump(), two_level_tree()]).unwrap();
        let proba = ensemble.predict_proba(&[1.0, 0.0]);
        assert!((proba - (0.8 + 0.9) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_structures_rejected() {
        let cyclic = DecisionTree::new(vec![split(0, 0.5, 0, 1, 10.0), leaf(0.5, 5.0)]);
        assert!(TreeEnsemble::new(1, vec![cyclic]).is_err());

        let out_of_range = DecisionTree::new(vec![split(3, 0.5, 1, 2, 10.0), leaf(0.1, 5.0), leaf(0.2, 5.0)]);
        assert!(TreeEnsemble::new(2, vec![out_of_range]).is_err());

        let bad_leaf = DecisionTree::new(vec![leaf(1.5, 1.0)]);
        assert!(TreeEnsemble::new(1, vec![bad_leaf]).is_err());

        let zero_cover = DecisionTree::new(vec![split(0, 0.5, 1, 2, 10.0), leaf(0.1, 0.0), leaf(0.2, 10.0)]);
        assert!(TreeEnsemble::new(1, vec![zero_cover]).is_err());

        assert!(TreeEnsemble::new(1, Vec::new()).is_err());
    }

    #[test]
    fn test_shared_and_unreachable_nodes_rejected() {
        // Nodes 1 and 2 both point at leaf 3.
        let shared = DecisionTree::new(vec![
            split(0, 0.5, 1, 2, 100.0),
            split(1, 0.5, 3, 4, 50.0),
            split(1, 0.5, 3, 5, 50.0),
            leaf(0.9, 25.0),
            leaf(0.1, 25.0),
            leaf(0.5, 25.0),
        ]);
        assert!(TreeEnsemble::new(2, vec![shared]).is_err());

        let unreachable = DecisionTree::new(vec![
            split(0, 0.5, 1, 2, 10.0),
            leaf(0.1, 5.0),
            leaf(0.2, 5.0),
            leaf(0.9, 5.0),
        ]);
        assert!(TreeEnsemble::new(1, vec![unreachable]).is_err());
    }

    #[test]
    fn test_inconsistent_cover_rejected() {
        let tree = DecisionTree::new(vec![split(0, 0.5, 1, 2, 100.0), leaf(0.2, 30.0), leaf(0.8, 50.0)]);
        let err = TreeEnsemble::new(1, vec![tree]).err().unwrap();
        assert!(format!("{:#}", err).contains("children cover"));

        // Float noise in trained covers is tolerated.
        let tree = DecisionTree::new(vec![
            split(0, 0.5, 1, 2, 100.0),
            leaf(0.2, 33.3333333),
            leaf(0.8, 66.6666667),
        ]);
        assert!(TreeEnsemble::new(1, vec![tree]).is_ok());
    }

    #[test]
    fn test_artifact_format() {
        let json = r#"{
            "n_features": 1,
            "trees": [{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 0.5, "left": 1, "right": 2, "cover": 10},
                {"kind": "leaf", "value": 0.25, "cover": 4},
                {"kind": "leaf", "value": 0.75, "cover": 6}
            ]}]
        }"#;

        let ensemble: TreeEnsemble = serde_json::from_str(json).unwrap();
        assert!(ensemble.validate().is_ok());
        assert_eq!(ensemble.predict_proba(&[0.0]), 0.25);
        assert!((ensemble.expected_value() - 0.55).abs() < 1e-12);
    }
}
