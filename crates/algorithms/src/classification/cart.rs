//! CART tree induction
//!
//! Grows a binary classification tree by recursive partitioning:
//!
//! 1. A node becomes a leaf when it is empty or pure, holds fewer than
//!    `min_samples_split` samples, or sits at `max_depth`.
//! 2. Otherwise the (band, threshold) pair with the lowest size-weighted
//!    child impurity is chosen (see [`super::split`]). If no pair lowers the
//!    node's impurity, the node becomes a leaf.
//! 3. Samples with `value <= threshold` go left, the rest go right, and both
//!    children are grown the same way.
//!
//! The result depends only on the samples, the parameters and the label
//! alphabet. Growth runs off an explicit work stack, so tree depth is not
//! bounded by thread stack size. Large shallow nodes build their two
//! children with a fork-join, which does not change the tree.

use tracing::debug;
use landcart_core::{Algorithm, Error, Result};
use landcart_parallel::ProcessingMode;

use super::split::SplitSearch;
use super::training::TrainingSet;
use super::tree::{DecisionTree, TreeNode, TreeParams};

/// Nodes smaller than this build their children on the current thread
const FORK_MIN_SAMPLES: usize = 2048;

/// Nodes this deep or deeper grow their whole subtree on one worker
const FORK_MAX_DEPTH: usize = 12;

/// CART training as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct TreeTrainer;

impl Algorithm for TreeTrainer {
    type Input = TrainingSet;
    type Output = DecisionTree;
    type Params = TreeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DecisionTree"
    }

    fn description(&self) -> &'static str {
        "CART classification tree grown by recursive impurity-minimizing splits"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        train(&input, &params)
    }
}

/// Train a classification tree on all available cores.
///
/// # Errors
/// [`Error::InvalidParameter`] for out-of-range parameters.
pub fn train(training: &TrainingSet, params: &TreeParams) -> Result<DecisionTree> {
    train_with_mode(training, params, ProcessingMode::default())
}

/// Train a classification tree with an explicit execution mode.
///
/// Every mode produces the same tree.
pub fn train_with_mode(
    training: &TrainingSet,
    params: &TreeParams,
    mode: ProcessingMode,
) -> Result<DecisionTree> {
    params.validate()?;
    if training.is_empty() {
        return Err(Error::EmptyTrainingSet);
    }

    let grower = Grower {
        search: SplitSearch {
            samples: training.samples(),
            n_bands: training.bands().len(),
            n_classes: training.alphabet().len(),
            impurity: params.impurity,
            min_samples_leaf: params.min_samples_leaf,
            parallel: mode.is_parallel(),
        },
        params,
        mode,
    };

    let indices: Vec<usize> = (0..training.len()).collect();
    let nodes = mode.install(|| grower.grow(indices, 0));
    let tree = DecisionTree::new(
        training.bands().to_vec(),
        training.alphabet().clone(),
        params.clone(),
        nodes,
    );

    debug!(
        "trained tree: depth {}, {} leaves, {} nodes",
        tree.depth(),
        tree.n_leaves(),
        tree.n_nodes()
    );
    Ok(tree)
}

struct Grower<'a> {
    search: SplitSearch<'a>,
    params: &'a TreeParams,
    mode: ProcessingMode,
}

/// Node waiting to be grown, and the split slot that will point at it
struct Pending {
    indices: Vec<usize>,
    depth: usize,
    parent: Option<(usize, Side)>,
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

enum Step {
    Leaf(TreeNode),
    Split {
        node: TreeNode,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

impl Grower<'_> {
    /// Grow the subtree over `indices` into a pre-order node list.
    ///
    /// Works from an explicit stack. Large shallow nodes hand their two
    /// subtrees to [`ProcessingMode::join`] and splice the results back in
    /// order, so the layout is the same in every mode.
    fn grow(&self, indices: Vec<usize>, depth: usize) -> Vec<TreeNode> {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut stack = vec![Pending {
            indices,
            depth,
            parent: None,
        }];

        while let Some(Pending { indices, depth, parent }) = stack.pop() {
            let id = nodes.len();
            if let Some((p, side)) = parent {
                attach(&mut nodes[p], side, id);
            }
            let n = indices.len();

            match self.step(indices, depth) {
                Step::Leaf(node) => nodes.push(node),
                Step::Split { node, left, right } => {
                    nodes.push(node);
                    let fork = self.mode.is_parallel() && n >= FORK_MIN_SAMPLES && depth < FORK_MAX_DEPTH;
                    if fork {
                        let (l, r) = self.mode.join(
                            || self.grow(left, depth + 1),
                            || self.grow(right, depth + 1),
                        );
                        attach(&mut nodes[id], Side::Left, id + 1);
                        attach(&mut nodes[id], Side::Right, id + 1 + l.len());
                        splice(&mut nodes, l);
                        splice(&mut nodes, r);
                    } else {
                        stack.push(Pending {
                            indices: right,
                            depth: depth + 1,
                            parent: Some((id, Side::Right)),
                        });
                        stack.push(Pending {
                            indices: left,
                            depth: depth + 1,
                            parent: Some((id, Side::Left)),
                        });
                    }
                }
            }
        }
        nodes
    }

    /// Turn one node into a leaf, or into a split plus its two partitions
    fn step(&self, indices: Vec<usize>, depth: usize) -> Step {
        let counts = self.class_counts(&indices);
        let n = indices.len();

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let at_max_depth = self.params.max_depth.map_or(false, |d| depth >= d);
        if pure || n < self.params.min_samples_split || at_max_depth {
            return Step::Leaf(leaf(counts));
        }

        let Some(split) = self.search.best(&indices, &counts) else {
            return Step::Leaf(leaf(counts));
        };

        let samples = self.search.samples;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| samples[i].values()[split.band] <= split.threshold);

        Step::Split {
            node: TreeNode::Split {
                band: split.band,
                threshold: split.threshold,
                samples: n,
                impurity: self.params.impurity.of(&counts, n),
                left: 0,
                right: 0,
            },
            left,
            right,
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.search.n_classes];
        for &i in indices {
            counts[self.search.samples[i].class()] += 1;
        }
        counts
    }
}

fn attach(parent: &mut TreeNode, side: Side, child: usize) {
    if let TreeNode::Split { left, right, .. } = parent {
        match side {
            Side::Left => *left = child,
            Side::Right => *right = child,
        }
    }
}

/// Append a subtree grown on its own, shifting its child links
fn splice(nodes: &mut Vec<TreeNode>, subtree: Vec<TreeNode>) {
    let offset = nodes.len();
    nodes.extend(subtree.into_iter().map(|mut node| {
        if let TreeNode::Split { left, right, .. } = &mut node {
            *left += offset;
            *right += offset;
        }
        node
    }));
}

/// Leaf predicting the majority class; ties go to the lowest class index.
fn leaf(counts: Vec<usize>) -> TreeNode {
    let class = counts
        .iter()
        .enumerate()
        .fold(0, |best, (i, &c)| if c > counts[best] { i } else { best });
    TreeNode::Leaf { class, counts }
}
