//! Decision tree model
//!
//! A trained tree is a write-once binary tree stored as a flat node list.
//! Split nodes send `value <= threshold` left and `value > threshold` right;
//! leaves keep the per-class counts of the training samples that reached them.

use serde::{Deserialize, Serialize};
use std::fmt;
use landcart_core::sample::{LabelAlphabet, Legend};
use landcart_core::{Error, Result};

use super::training::check_class_capacity;

/// Impurity measure used to score candidate splits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impurity {
    /// Gini impurity `1 - Σ p²`
    #[default]
    Gini,
    /// Shannon entropy `-Σ p log2 p`
    Entropy,
}

impl Impurity {
    /// Impurity of a class distribution with `total` samples
    pub fn of(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Impurity::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            Impurity::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

impl std::str::FromStr for Impurity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(Impurity::Gini),
            "entropy" | "information" => Ok(Impurity::Entropy),
            other => Err(format!("unknown impurity measure: {other} (use gini or entropy)")),
        }
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impurity::Gini => write!(f, "gini"),
            Impurity::Entropy => write!(f, "entropy"),
        }
    }
}

/// Parameters controlling tree growth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0 (default: unbounded)
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves (default: 2)
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split (default: 1)
    pub min_samples_leaf: usize,
    /// Split scoring measure (default: Gini)
    pub impurity: Impurity,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            impurity: Impurity::Gini,
        }
    }
}

impl TreeParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(Error::InvalidParameter {
                name: "min_samples_split",
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".into(),
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(Error::InvalidParameter {
                name: "min_samples_leaf",
                value: self.min_samples_leaf.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// A node of a trained tree
///
/// Children are referenced by their position in [`DecisionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// Internal decision node
    Split {
        /// Index into the tree's band list
        band: usize,
        threshold: f64,
        /// Training samples that reached this node
        samples: usize,
        /// Impurity of those samples
        impurity: f64,
        /// Node for `value <= threshold`
        left: usize,
        /// Node for `value > threshold`
        right: usize,
    },
    /// Terminal node
    Leaf {
        /// Predicted class index
        class: usize,
        /// Training samples per class index
        counts: Vec<usize>,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Number of training samples that reached this node
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Split { samples, .. } => *samples,
            TreeNode::Leaf { counts, .. } => counts.iter().sum(),
        }
    }
}

/// A trained classification tree with its band list and label alphabet.
///
/// Nodes are stored flat in pre-order: the root is node 0 and every child
/// sits after its parent. The serialized model keeps the same flat list, and
/// deserializing checks it with [`DecisionTree::validate`].
///
/// Immutable once trained; share it by reference across prediction workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeRecord")]
pub struct DecisionTree {
    bands: Vec<String>,
    alphabet: LabelAlphabet,
    params: TreeParams,
    nodes: Vec<TreeNode>,
}

#[derive(Deserialize)]
struct TreeRecord {
    bands: Vec<String>,
    alphabet: LabelAlphabet,
    params: TreeParams,
    nodes: Vec<TreeNode>,
}

impl TryFrom<TreeRecord> for DecisionTree {
    type Error = Error;

    fn try_from(record: TreeRecord) -> Result<Self> {
        let tree = Self::new(record.bands, record.alphabet, record.params, record.nodes);
        tree.validate()?;
        Ok(tree)
    }
}

impl DecisionTree {
    pub(crate) fn new(bands: Vec<String>, alphabet: LabelAlphabet, params: TreeParams, nodes: Vec<TreeNode>) -> Self {
        Self {
            bands,
            alphabet,
            params,
            nodes,
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    /// All nodes in pre-order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Bands the tree was trained on; prediction values follow this order
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    /// Name of a band index used in split nodes
    pub fn band_name(&self, band: usize) -> Option<&str> {
        self.bands.get(band).map(String::as_str)
    }

    pub fn alphabet(&self) -> &LabelAlphabet {
        &self.alphabet
    }

    /// Parameters the tree was grown with
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Class code → label legend for classified rasters
    pub fn legend(&self) -> Legend {
        self.alphabet.legend()
    }

    /// Longest root-to-leaf path (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        let mut depths = vec![0; self.nodes.len()];
        let mut deepest = 0;
        for (id, node) in self.nodes.iter().enumerate() {
            deepest = deepest.max(depths[id]);
            if let TreeNode::Split { left, right, .. } = node {
                depths[*left] = depths[id] + 1;
                depths[*right] = depths[id] + 1;
            }
        }
        deepest
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Check the node layout, band references and leaf classes.
    ///
    /// Every child must come after its parent and have exactly one parent,
    /// so the nodes form a single tree rooted at node 0.
    pub fn validate(&self) -> Result<()> {
        check_class_capacity(&self.alphabet)?;
        if self.nodes.is_empty() {
            return Err(Error::Algorithm("tree has no nodes".into()));
        }

        let mut parents = vec![0usize; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    band,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *band >= self.bands.len() || !threshold.is_finite() {
                        return Err(Error::Algorithm(format!(
                            "invalid split on band {band} at {threshold}"
                        )));
                    }
                    for &child in [left, right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(Error::Algorithm(format!(
                                "node {id} has out-of-order child {child}"
                            )));
                        }
                        parents[child] += 1;
                    }
                }
                TreeNode::Leaf { class, counts } => {
                    if *class >= self.alphabet.len() || counts.len() != self.alphabet.len() {
                        return Err(Error::Algorithm(format!(
                            "leaf class {class} does not fit a {}-label alphabet",
                            self.alphabet.len()
                        )));
                    }
                }
            }
        }

        match parents.iter().skip(1).position(|&p| p != 1) {
            Some(i) => Err(Error::Algorithm(format!(
                "node {} is referenced {} times",
                i + 1,
                parents[i + 1]
            ))),
            None => Ok(()),
        }
    }

    /// Follow splits to a leaf; yields its class and counts.
    fn reach(&self, values: &[f64]) -> (usize, &[usize]) {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                TreeNode::Split {
                    band,
                    threshold,
                    left,
                    right,
                    ..
                } => id = if values[*band] <= *threshold { *left } else { *right },
                TreeNode::Leaf { class, counts } => return (*class, counts.as_slice()),
            }
        }
    }

    /// Leaf reached by `values` (one value per tree band)
    ///
    /// # Panics
    /// Panics if `values` is shorter than [`DecisionTree::bands`].
    pub fn leaf(&self, values: &[f64]) -> &TreeNode {
        let mut id = 0;
        while let TreeNode::Split {
            band,
            threshold,
            left,
            right,
            ..
        } = &self.nodes[id]
        {
            id = if values[*band] <= *threshold { *left } else { *right };
        }
        &self.nodes[id]
    }

    /// Predicted class index for `values` (one value per tree band)
    ///
    /// # Panics
    /// Panics if `values` is shorter than [`DecisionTree::bands`].
    pub fn classify(&self, values: &[f64]) -> usize {
        self.reach(values).0
    }

    /// Class probabilities for `values`: leaf counts over leaf total
    pub fn probabilities(&self, values: &[f64]) -> Vec<f64> {
        let (class, counts) = self.reach(values);
        let total: usize = counts.iter().sum();
        if total == 0 {
            let mut p = vec![0.0; counts.len()];
            if let Some(slot) = p.get_mut(class) {
                *slot = 1.0;
            }
            return p;
        }
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Total impurity decrease contributed by each band, normalized to sum 1.
    ///
    /// All zeros for a single-leaf tree.
    pub fn band_importances(&self) -> Vec<(String, f64)> {
        let mut totals = vec![0.0; self.bands.len()];
        for node in &self.nodes {
            if let TreeNode::Split {
                band,
                samples,
                impurity,
                left,
                right,
                ..
            } = node
            {
                let child = |id: usize| {
                    let n = &self.nodes[id];
                    n.n_samples() as f64 * self.node_impurity(n)
                };
                let decrease = *samples as f64 * impurity - child(*left) - child(*right);
                totals[*band] += decrease.max(0.0);
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|t| *t /= sum);
        }
        self.bands.iter().cloned().zip(totals).collect()
    }

    fn node_impurity(&self, node: &TreeNode) -> f64 {
        match node {
            TreeNode::Split { impurity, .. } => *impurity,
            TreeNode::Leaf { counts, .. } => self.params.impurity.of(counts, counts.iter().sum()),
        }
    }
}

/// Pending output of the tree printer
enum Line {
    Node { id: usize, indent: usize },
    Otherwise { band: usize, threshold: f64, indent: usize },
}

impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Line::Node { id: 0, indent: 0 }];
        while let Some(line) = pending.pop() {
            match line {
                Line::Node { id, indent } => {
                    let pad = "  ".repeat(indent);
                    match &self.nodes[id] {
                        TreeNode::Leaf { class, counts } => {
                            let label = self.alphabet.label(*class).unwrap_or("?");
                            writeln!(f, "{pad}-> {label} {counts:?}")?;
                        }
                        TreeNode::Split {
                            band,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            let name = self.band_name(*band).unwrap_or("?");
                            writeln!(f, "{pad}{name} <= {threshold}")?;
                            pending.push(Line::Node { id: *right, indent: indent + 1 });
                            pending.push(Line::Otherwise {
                                band: *band,
                                threshold: *threshold,
                                indent,
                            });
                            pending.push(Line::Node { id: *left, indent: indent + 1 });
                        }
                    }
                }
                Line::Otherwise { band, threshold, indent } => {
                    let name = self.band_name(band).unwrap_or("?");
                    writeln!(f, "{}{name} > {threshold}", "  ".repeat(indent))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landcart_core::sample::LabelOrder;

    fn leaf(class: usize, counts: Vec<usize>) -> TreeNode {
        TreeNode::Leaf { class, counts }
    }

    fn split(band: usize, threshold: f64, samples: usize, left: usize, right: usize) -> TreeNode {
        TreeNode::Split {
            band,
            threshold,
            samples,
            impurity: 0.5,
            left,
            right,
        }
    }

    fn urban_water() -> LabelAlphabet {
        LabelAlphabet::from_labels(["urban", "water"], LabelOrder::Lexicographic)
    }

    fn water_urban_tree() -> DecisionTree {
        DecisionTree::new(
            vec!["red".into(), "green".into()],
            urban_water(),
            TreeParams::default(),
            vec![split(0, 43.5, 4, 1, 2), leaf(1, vec![0, 2]), leaf(0, vec![2, 0])],
        )
    }

    #[test]
    fn test_gini() {
        assert_relative_eq!(Impurity::Gini.of(&[5, 5], 10), 0.5, epsilon = 1e-12);
        assert_relative_eq!(Impurity::Gini.of(&[10, 0], 10), 0.0, epsilon = 1e-12);
        assert_relative_eq!(Impurity::Gini.of(&[1, 1, 1], 3), 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(Impurity::Gini.of(&[], 0), 0.0);
    }

    #[test]
    fn test_entropy() {
        assert_relative_eq!(Impurity::Entropy.of(&[5, 5], 10), 1.0, epsilon = 1e-12);
        assert_relative_eq!(Impurity::Entropy.of(&[4, 0], 4), 0.0, epsilon = 1e-12);
        assert_relative_eq!(Impurity::Entropy.of(&[1, 1, 1, 1], 4), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_impurity_from_str() {
        assert_eq!("Gini".parse::<Impurity>(), Ok(Impurity::Gini));
        assert_eq!("entropy".parse::<Impurity>(), Ok(Impurity::Entropy));
        assert!("mse".parse::<Impurity>().is_err());
        assert_eq!(Impurity::Entropy.to_string(), "entropy");
    }

    #[test]
    fn test_params_validation() {
        assert!(TreeParams::default().validate().is_ok());
        let p = TreeParams {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(p.validate().is_err());
        let p = TreeParams {
            min_samples_leaf: 0,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_classify_and_structure() {
        let tree = water_urban_tree();
        assert_eq!(tree.classify(&[11.0, 20.0]), 1);
        assert_eq!(tree.classify(&[43.5, 20.0]), 1);
        assert_eq!(tree.classify(&[90.0, 20.0]), 0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.root().n_samples(), 4);
        assert!(tree.nodes()[1].is_leaf());
        assert_eq!(tree.leaf(&[90.0, 20.0]), &tree.nodes()[2]);
    }

    #[test]
    fn test_depth_of_unbalanced_tree() {
        // root -> (leaf, split -> (split -> (leaf, leaf), leaf))
        let tree = DecisionTree::new(
            vec!["red".into()],
            urban_water(),
            TreeParams::default(),
            vec![
                split(0, 1.0, 5, 1, 2),
                leaf(0, vec![1, 0]),
                split(0, 3.0, 4, 3, 6),
                split(0, 2.0, 2, 4, 5),
                leaf(1, vec![0, 1]),
                leaf(0, vec![1, 0]),
                leaf(1, vec![0, 2]),
            ],
        );
        assert!(tree.validate().is_ok());
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.n_leaves(), 4);
        assert_eq!(tree.classify(&[2.5]), 0);
        assert_eq!(tree.classify(&[9.0]), 1);
    }

    #[test]
    fn test_probabilities() {
        let tree = water_urban_tree();
        assert_eq!(tree.probabilities(&[11.0, 0.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn test_band_importances() {
        let imp = water_urban_tree().band_importances();
        assert_eq!(imp[0].0, "red");
        assert_relative_eq!(imp[0].1, 1.0, epsilon = 1e-12);
        assert_relative_eq!(imp[1].1, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_unknown_band() {
        let tree = water_urban_tree();
        let bad = DecisionTree::new(
            vec!["red".into()],
            urban_water(),
            TreeParams::default(),
            vec![split(3, 1.0, 2, 1, 2), leaf(0, vec![1, 0]), leaf(1, vec![0, 1])],
        );
        assert!(bad.validate().is_err());
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_layout() {
        let with_nodes = |nodes: Vec<TreeNode>| {
            DecisionTree::new(vec!["red".into()], urban_water(), TreeParams::default(), nodes)
        };
        // child before its parent
        assert!(with_nodes(vec![leaf(0, vec![1, 0]), split(0, 1.0, 2, 0, 0)]).validate().is_err());
        // shared child
        assert!(with_nodes(vec![split(0, 1.0, 2, 1, 1), leaf(0, vec![1, 0])]).validate().is_err());
        // unreachable node
        assert!(with_nodes(vec![leaf(0, vec![1, 0]), leaf(1, vec![0, 1])]).validate().is_err());
        // dangling child
        assert!(with_nodes(vec![split(0, 1.0, 2, 1, 7), leaf(0, vec![1, 0])]).validate().is_err());
        assert!(with_nodes(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_display() {
        let text = water_urban_tree().to_string();
        assert_eq!(
            text,
            "red <= 43.5\n  -> water [0, 2]\nred > 43.5\n  -> urban [2, 0]\n"
        );
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let tree = water_urban_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.classify(&[90.0, 0.0]), 0);
    }

    #[test]
    fn test_deserialize_rejects_invalid_tree() {
        let mut json = serde_json::to_value(water_urban_tree()).unwrap();
        json["nodes"][0]["band"] = serde_json::json!(9);
        assert!(serde_json::from_value::<DecisionTree>(json).is_err());
    }

    #[test]
    fn test_deep_chain_serializes_flat() {
        // 500 splits, each peeling one sample off to the left
        let depth = 500;
        let mut nodes = Vec::new();
        for level in 0..depth {
            let id = nodes.len();
            nodes.push(split(0, level as f64, depth + 1 - level, id + 1, id + 2));
            nodes.push(leaf(level % 2, if level % 2 == 0 { vec![1, 0] } else { vec![0, 1] }));
        }
        nodes.push(leaf(0, vec![1, 0]));
        let tree = DecisionTree::new(vec!["red".into()], urban_water(), TreeParams::default(), nodes);
        assert!(tree.validate().is_ok());
        assert_eq!(tree.depth(), depth);

        let json = serde_json::to_string(&tree).unwrap();
        let back: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.depth(), depth);
        assert_eq!(back.classify(&[3.0]), 1);
        assert!(back.to_string().lines().count() > 2 * depth);
    }
}
