//! Inference engine for return risk prediction

use crate::error::InferenceError;
use crate::feature_encoder::AlignedVector;
use crate::models::forest::TreeEnsemble;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Probabilities strictly above this are labelled as returns.
pub const RETURN_THRESHOLD: f64 = 0.5;

/// Binary return prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnLabel {
    Yes,
    No,
}

impl ReturnLabel {
    /// Label for a probability; a tie at the threshold is `No`.
    pub fn from_probability(probability: f64) -> Self {
        if probability > RETURN_THRESHOLD {
            ReturnLabel::Yes
        } else {
            ReturnLabel::No
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnLabel::Yes => "Yes",
            ReturnLabel::No => "No",
        }
    }
}

/// Round a probability to 3 decimal places for output.
pub fn round_probability(probability: f64) -> f64 {
    (probability * 1000.0).round() / 1000.0
}

/// Result of model inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Full-precision positive-class probability (0.0 - 1.0)
    pub probability: f64,
    /// Label derived from the full-precision probability
    pub label: ReturnLabel,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            label: ReturnLabel::from_probability(probability),
        }
    }

    /// Probability as reported to callers.
    pub fn return_probability(&self) -> f64 {
        round_probability(self.probability)
    }

    pub fn to_response(&self) -> PredictionResponse {
        PredictionResponse {
            return_probability: self.return_probability(),
            prediction: self.label,
        }
    }
}

/// Wire form of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub return_probability: f64,
    pub prediction: ReturnLabel,
}

/// Inference engine over the shared tree ensemble.
pub struct InferenceEngine {
    forest: Arc<TreeEnsemble>,
}

impl InferenceEngine {
    pub fn new(forest: Arc<TreeEnsemble>) -> Self {
        Self { forest }
    }

    /// The classifier this engine scores with.
    pub fn forest(&self) -> &Arc<TreeEnsemble> {
        &self.forest
    }

    pub fn tree_count(&self) -> usize {
        self.forest.trees.len()
    }

    /// Score an aligned feature vector.
    pub fn predict(&self, features: &AlignedVector) -> Result<Prediction, InferenceError> {
        if features.len() != self.forest.n_features {
            return Err(InferenceError::ShapeMismatch {
                expected: self.forest.n_features,
                actual: features.len(),
            });
        }

        let prediction = Prediction::from_probability(self.forest.predict_proba(features.values()));

        debug!(
            probability = prediction.probability,
            label = prediction.label.as_str(),
            "Inference complete"
        );

        Ok(prediction)
    }

    /// Score a batch of feature vectors
    pub fn predict_batch(&self, batch: &[AlignedVector]) -> Vec<Result<Prediction, InferenceError>> {
        batch.iter().map(|features| self.predict(features)).collect()
    }
}
