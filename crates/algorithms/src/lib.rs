//! # LandCART Algorithms
//!
//! Land-cover classification of multiband imagery.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: Reflectance normalization of sensor digital numbers
//! - **classification**: Training set construction, CART training, raster
//!   prediction and accuracy assessment

pub mod imagery;
pub mod classification;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{normalize_band, normalize_reflectance, ReflectanceNormalizer, ReflectanceParams};
    pub use crate::classification::{
        build_training_set, evaluate, predict, predict_proba, predict_with, train, train_with_mode,
        Classification, ConfusionMatrix, DecisionTree, Impurity, PredictParams, TrainingSet,
        TreeNode, TreeParams, TreeTrainer,
    };
    pub use landcart_core::prelude::*;
    pub use landcart_parallel::ProcessingMode;
}
