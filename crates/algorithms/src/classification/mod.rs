//! Supervised land-cover classification with CART decision trees
//!
//! - **training**: join feature vectors with labels into a [`TrainingSet`]
//! - **cart**: grow a [`DecisionTree`] by recursive impurity-minimizing splits
//! - **predict**: classify every pixel of a band stack
//! - **assessment**: confusion matrix and accuracy metrics

mod training;
mod tree;
mod split;
mod cart;
mod predict;
mod assessment;

pub use training::{build_training_set, TrainingSet};
pub use tree::{DecisionTree, Impurity, TreeNode, TreeParams};
pub use cart::{train, train_with_mode, TreeTrainer};
pub use predict::{predict, predict_proba, predict_with, Classification, PredictParams};
pub use assessment::{evaluate, ConfusionMatrix, LabeledMatrix};
