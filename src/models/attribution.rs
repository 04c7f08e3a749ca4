//! Attribution engine: ranked, human-readable reasons for a prediction.
//!
//! Contributions come from a [`FeatureAttributor`] (TreeSHAP over the served
//! classifier in production). The engine ranks them, keeps the strongest
//! three and renders each as a sentence. If anything about the attribution
//! goes wrong the caller still gets three reasons: the fixed fallback set.

use crate::error::AttributionError;
use crate::feature_encoder::AlignedVector;
use crate::models::forest::TreeEnsemble;
use crate::models::tree_shap::TreeShapExplainer;
use crate::schema::{AGE_GROUP_FIELD, CATEGORY_FIELD, REGION_FIELD, SIZE_FIELD};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of reasons in every explanation.
pub const TOP_REASONS: usize = 3;

/// Contributions above this magnitude are reported as strong.
pub const STRONG_IMPACT_THRESHOLD: f64 = 0.1;

/// Reasons returned when attribution fails.
pub const FALLBACK_REASONS: [&str; TOP_REASONS] = [
    "Product rating affects return likelihood",
    "Delivery time influences customer satisfaction",
    "Past return history is a key indicator",
];

/// Computes one signed contribution per feature for the positive class.
pub trait FeatureAttributor: Send + Sync {
    /// Contributions parallel to `features.values()`.
    fn attribute(&self, features: &AlignedVector) -> Result<Vec<f64>, AttributionError>;

    /// Baseline the contributions are measured from.
    fn expected_value(&self) -> f64;
}

impl FeatureAttributor for TreeShapExplainer {
    fn attribute(&self, features: &AlignedVector) -> Result<Vec<f64>, AttributionError> {
        self.shap_values(features.values())
    }

    fn expected_value(&self) -> f64 {
        TreeShapExplainer::expected_value(self)
    }
}

/// A feature column and its signed contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub column: String,
    pub contribution: f64,
}

impl FeatureContribution {
    /// Sentence describing this contribution.
    pub fn describe(&self) -> String {
        let strength = if self.contribution.abs() > STRONG_IMPACT_THRESHOLD {
            "strongly"
        } else {
            "slightly"
        };
        let direction = if self.contribution > 0.0 {
            "increases"
        } else {
            "decreases"
        };
        format!(
            "{} {} {} return likelihood",
            display_label(&self.column),
            strength,
            direction
        )
    }
}

/// Outcome of an explanation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Explanation {
    /// Reasons derived from the top contributions.
    Attributed {
        contributions: Vec<FeatureContribution>,
        reasons: Vec<String>,
    },
    /// Attribution failed; the fixed fallback reasons.
    Fallback {
        cause: AttributionError,
        reasons: Vec<String>,
    },
}

impl Explanation {
    pub fn fallback(cause: AttributionError) -> Self {
        Explanation::Fallback {
            cause,
            reasons: FALLBACK_REASONS.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Explanation::Attributed { reasons, .. } | Explanation::Fallback { reasons, .. } => {
                reasons
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Explanation::Fallback { .. })
    }

    pub fn to_response(&self) -> ExplanationResponse {
        ExplanationResponse {
            top_reasons: self.reasons().to_vec(),
        }
    }
}

/// Wire form of an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResponse {
    pub top_reasons: Vec<String>,
}

/// Ranks attributions and renders them as reasons.
pub struct AttributionEngine {
    attributor: Arc<dyn FeatureAttributor>,
}

impl AttributionEngine {
    pub fn new(attributor: Arc<dyn FeatureAttributor>) -> Self {
        Self { attributor }
    }

    /// Engine backed by TreeSHAP over the given classifier.
    pub fn tree_shap(forest: Arc<TreeEnsemble>) -> Self {
        Self::new(Arc::new(TreeShapExplainer::new(forest)))
    }

    pub fn expected_value(&self) -> f64 {
        self.attributor.expected_value()
    }

    /// Explain a feature vector. Never fails: attribution errors are logged
    /// and answered with the fallback reasons.
    pub fn explain(&self, features: &AlignedVector) -> Explanation {
        match self.top_contributions(features) {
            Ok(contributions) => {
                let reasons = contributions
                    .iter()
                    .map(FeatureContribution::describe)
                    .collect();
                debug!(contributions = ?contributions, "Attribution complete");
                Explanation::Attributed {
                    contributions,
                    reasons,
                }
            }
            Err(cause) => {
                warn!(error = %cause, "Attribution failed, returning fallback reasons");
                Explanation::fallback(cause)
            }
        }
    }

    /// Top contributions by magnitude, ties kept in column order.
    fn top_contributions(
        &self,
        features: &AlignedVector,
    ) -> Result<Vec<FeatureContribution>, AttributionError> {
        let scores = self.attributor.attribute(features)?;

        if scores.len() != features.len() {
            return Err(AttributionError::ShapeMismatch {
                expected: features.len(),
                actual: scores.len(),
            });
        }
        if scores.len() < TOP_REASONS {
            return Err(AttributionError::TooFewFeatures {
                required: TOP_REASONS,
                actual: scores.len(),
            });
        }
        if let Some(idx) = scores.iter().position(|score| !score.is_finite()) {
            return Err(AttributionError::NonFinite {
                column: features.columns()[idx].clone(),
            });
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].abs().total_cmp(&scores[a].abs()));

        Ok(order
            .into_iter()
            .take(TOP_REASONS)
            .map(|idx| FeatureContribution {
                column: features.columns()[idx].clone(),
                contribution: scores[idx],
            })
            .collect())
    }
}

/// Human-readable label for an encoded column.
///
/// Indicator columns become `"<Field>: <value>"`; any other column has its
/// separators replaced by spaces and each word capitalised.
pub fn display_label(column: &str) -> String {
    const INDICATOR_LABELS: [(&str, &str); 4] = [
        (CATEGORY_FIELD, "Product Category"),
        (SIZE_FIELD, "Product Size"),
        (REGION_FIELD, "Customer Region"),
        (AGE_GROUP_FIELD, "Customer Age"),
    ];

    for (field, label) in INDICATOR_LABELS {
        if let Some(value) = column
            .strip_prefix(field)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            if field == AGE_GROUP_FIELD {
                return format!("{}: {}", label, value.replace('_', "-"));
            }
            return format!("{}: {}", label, value);
        }
    }

    title_case(&column.replace('_', " "))
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alphabetic = false;
    for ch in text.chars() {
        if prev_alphabetic {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_alphabetic = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownCategoryPolicy;
    use crate::feature_encoder::FeatureEncoder;
    use crate::models::forest::tests::{leaf, split};
    use crate::models::forest::DecisionTree;
    use crate::schema::tests::training_schema;
    use crate::schema::SchemaRegistry;
    use crate::types::order::OrderRecord;

    /// Returns fixed scores regardless of input.
    struct FixedAttributor(Vec<f64>);

    impl FeatureAttributor for FixedAttributor {
        fn attribute(&self, _features: &AlignedVector) -> Result<Vec<f64>, AttributionError> {
            Ok(self.0.clone())
        }

        fn expected_value(&self) -> f64 {
            0.5
        }
    }

    struct FailingAttributor;

    impl FeatureAttributor for FailingAttributor {
        fn attribute(&self, _features: &AlignedVector) -> Result<Vec<f64>, AttributionError> {
            Err(AttributionError::Explainer("explainer crashed".to_string()))
        }

        fn expected_value(&self) -> f64 {
            0.5
        }
    }

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(training_schema())
    }

    fn encode(schema: &Arc<SchemaRegistry>, order: &OrderRecord) -> AlignedVector {
        FeatureEncoder::new(Arc::clone(schema), UnknownCategoryPolicy::Lenient)
            .encode(order)
            .unwrap()
    }

    fn sample_order() -> OrderRecord {
        OrderRecord::new("Shirts", "M", "South", "26-35").with_history(2, 4.2, 3)
    }

    /// Forest over the 17 training columns using rating, delivery time,
    /// past returns and the South region indicator.
    fn return_forest() -> TreeEnsemble {
        let rating_tree = DecisionTree::new(vec![
            split(1, 3.0, 1, 2, 200.0),
            split(2, 5.5, 3, 4, 80.0),
            leaf(0.35, 120.0),
            leaf(0.6, 50.0),
            leaf(0.9, 30.0),
        ]);
        let history_tree = DecisionTree::new(vec![
            split(0, 1.5, 1, 2, 200.0),
            leaf(0.2, 110.0),
            split(11, 0.5, 3, 4, 90.0),
            leaf(0.7, 60.0),
            leaf(0.45, 30.0),
        ]);
        TreeEnsemble::new(17, vec![rating_tree, history_tree]).unwrap()
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(display_label("Product_Category_Shirts"), "Product Category: Shirts");
        assert_eq!(display_label("Product_Size_M"), "Product Size: M");
        assert_eq!(display_label("Customer_Region_South"), "Customer Region: South");
        assert_eq!(display_label("Customer_Age_Group_26-35"), "Customer Age: 26-35");
        assert_eq!(display_label("Customer_Age_Group_46_60"), "Customer Age: 46-60");
        assert_eq!(display_label("Past_Return_Count"), "Past Return Count");
        assert_eq!(display_label("delivery_time_days"), "Delivery Time Days");
        assert_eq!(display_label("Product_Rating"), "Product Rating");
    }

    #[test]
    fn test_describe_direction_and_strength() {
        let strong_up = FeatureContribution {
            column: "Product_Rating".to_string(),
            contribution: 0.25,
        };
        let slight_down = FeatureContribution {
            column: "Customer_Region_South".to_string(),
            contribution: -0.05,
        };
        let zero = FeatureContribution {
            column: "Past_Return_Count".to_string(),
            contribution: 0.0,
        };
        let boundary = FeatureContribution {
            column: "Past_Return_Count".to_string(),
            contribution: 0.1,
        };

        assert_eq!(
            strong_up.describe(),
            "Product Rating strongly increases return likelihood"
        );
        assert_eq!(
            slight_down.describe(),
            "Customer Region: South slightly decreases return likelihood"
        );
        assert_eq!(
            zero.describe(),
            "Past Return Count slightly decreases return likelihood"
        );
        assert_eq!(
            boundary.describe(),
            "Past Return Count slightly increases return likelihood"
        );
    }

    #[test]
    fn test_ranking_by_magnitude_with_stable_ties() {
        let schema = schema();
        let mut scores = vec![0.0; 17];
        scores[2] = 0.05;
        scores[11] = -0.3;
        scores[0] = 0.05;
        scores[7] = 0.2;
        let engine = AttributionEngine::new(Arc::new(FixedAttributor(scores)));

        let explanation = engine.explain(&encode(&schema, &sample_order()));

        match &explanation {
            Explanation::Attributed { contributions, .. } => {
                let columns: Vec<&str> = contributions.iter().map(|c| c.column.as_str()).collect();
                assert_eq!(
                    columns,
                    vec!["Customer_Region_South", "Product_Size_M", "Past_Return_Count"]
                );
            }
            Explanation::Fallback { cause, .. } => panic!("unexpected fallback: {}", cause),
        }
        assert_eq!(
            explanation.reasons(),
            &[
                "Customer Region: South strongly decreases return likelihood",
                "Product Size: M strongly increases return likelihood",
                "Past Return Count slightly increases return likelihood",
            ]
        );
    }

    #[test]
    fn test_tree_shap_explanation_has_three_reasons() {
        let schema = schema();
        let engine = AttributionEngine::tree_shap(Arc::new(return_forest()));
        let order = OrderRecord::new("Shoes", "L", "East", "18-25").with_history(4, 2.0, 8);

        let explanation = engine.explain(&encode(&schema, &order));

        assert!(!explanation.is_fallback());
        assert_eq!(explanation.reasons().len(), TOP_REASONS);
        assert!(explanation
            .reasons()
            .iter()
            .all(|r| r.ends_with("return likelihood")));
    }

    #[test]
    fn test_explanation_is_deterministic() {
        let schema = schema();
        let engine = AttributionEngine::tree_shap(Arc::new(return_forest()));
        let features = encode(&schema, &sample_order());

        assert_eq!(engine.explain(&features), engine.explain(&features));
    }

    #[test]
    fn test_attributor_error_falls_back() {
        let schema = schema();
        let engine = AttributionEngine::new(Arc::new(FailingAttributor));

        let explanation = engine.explain(&encode(&schema, &sample_order()));

        assert!(explanation.is_fallback());
        assert_eq!(explanation.reasons(), &FALLBACK_REASONS);
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let schema = schema();
        let engine = AttributionEngine::new(Arc::new(FixedAttributor(vec![0.4, -0.2])));

        let explanation = engine.explain(&encode(&schema, &sample_order()));

        assert_eq!(
            explanation,
            Explanation::fallback(AttributionError::ShapeMismatch {
                expected: 17,
                actual: 2
            })
        );
        assert_eq!(explanation.reasons().len(), TOP_REASONS);
    }

    #[test]
    fn test_malformed_vector_falls_back() {
        // A forest fitted on two columns cannot explain a 17-column vector.
        let forest = TreeEnsemble::new(
            2,
            vec![DecisionTree::new(vec![
                split(0, 0.5, 1, 2, 10.0),
                leaf(0.1, 5.0),
                leaf(0.9, 5.0),
            ])],
        )
        .unwrap();
        let engine = AttributionEngine::tree_shap(Arc::new(forest));
        let schema = schema();

        let explanation = engine.explain(&encode(&schema, &sample_order()));
        assert_eq!(explanation.reasons(), &FALLBACK_REASONS);

        let truncated = AlignedVector::from_raw_parts(Arc::clone(&schema), vec![1.0, 2.0]);
        let engine = AttributionEngine::tree_shap(Arc::new(return_forest()));
        assert!(engine.explain(&truncated).is_fallback());
    }

    #[test]
    fn test_non_finite_scores_fall_back() {
        let schema = schema();
        let mut scores = vec![0.1; 17];
        scores[5] = f64::NAN;
        let engine = AttributionEngine::new(Arc::new(FixedAttributor(scores)));

        let explanation = engine.explain(&encode(&schema, &sample_order()));

        assert_eq!(
            explanation,
            Explanation::fallback(AttributionError::NonFinite {
                column: "Product_Category_Shoes".to_string()
            })
        );
    }

    #[test]
    fn test_response_shape() {
        let response = Explanation::fallback(AttributionError::Explainer("x".into())).to_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["top_reasons"].as_array().unwrap().len(), 3);
    }
}
