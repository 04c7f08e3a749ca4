//! Classifier, inference and attribution components

pub mod attribution;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod tree_shap;

pub use attribution::{AttributionEngine, Explanation, FeatureAttributor};
pub use forest::TreeEnsemble;
pub use inference::{InferenceEngine, Prediction, ReturnLabel};
pub use loader::ModelLoader;
pub use tree_shap::TreeShapExplainer;
