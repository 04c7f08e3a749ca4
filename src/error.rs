//! Typed per-request errors.
//!
//! Startup failures (artifacts, config) are reported through `anyhow` with
//! context; the errors here are the ones a single order can trigger.

use thiserror::Error;

/// An order that cannot be scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// A categorical field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Product rating outside the 1.0-5.0 scale.
    #[error("product rating must be between 1 and 5, got {0}")]
    InvalidRating(f64),

    /// Negative past return count.
    #[error("past return count cannot be negative, got {0}")]
    NegativeReturnCount(i64),

    /// Delivery time below one day.
    #[error("delivery time must be at least 1 day, got {0}")]
    InvalidDeliveryTime(i64),

    /// Category value not seen at training time (strict encoding only).
    #[error("unknown {field} value {value:?}")]
    UnknownCategory { field: &'static str, value: String },
}

/// The classifier could not score a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// The vector does not have the width the classifier was fitted on.
    #[error("feature vector has {actual} columns, classifier expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Failure of a scoring request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Attribution could not be computed for a feature vector.
///
/// Never surfaces to callers; the attribution engine turns it into the
/// fallback explanation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributionError {
    /// The vector does not have the width the explainer was fitted on.
    #[error("feature vector has {actual} columns, explainer expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A contribution came back as NaN or infinite.
    #[error("non-finite contribution for column {column}")]
    NonFinite { column: String },

    /// Fewer contributions than reasons requested.
    #[error("need at least {required} contributions, got {actual}")]
    TooFewFeatures { required: usize, actual: usize },

    /// Explainer-specific failure.
    #[error("explainer failed: {0}")]
    Explainer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_messages() {
        assert_eq!(
            InputError::InvalidRating(6.5).to_string(),
            "product rating must be between 1 and 5, got 6.5"
        );
        assert_eq!(
            InputError::UnknownCategory {
                field: "Customer_Region",
                value: "Mars".to_string()
            }
            .to_string(),
            "unknown Customer_Region value \"Mars\""
        );
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err: ServiceError = InputError::NegativeReturnCount(-2).into();
        assert_eq!(err.to_string(), "past return count cannot be negative, got -2");
    }

    #[test]
    fn test_attribution_error_messages() {
        let err = AttributionError::ShapeMismatch {
            expected: 17,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "feature vector has 4 columns, explainer expects 17"
        );
    }
}
