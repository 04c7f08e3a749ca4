//! Return assessment data structures

use crate::mitigation::{AlternativeSuggestion, DiscountSuggestion};
use crate::models::inference::ReturnLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scored order with explanation and mitigation suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnAssessment {
    /// Unique assessment identifier
    pub assessment_id: String,

    /// Order this assessment belongs to, when the caller supplied one
    pub order_id: Option<String>,

    /// Product category of the order
    pub product_category: String,

    /// Return probability rounded to 3 decimals
    pub return_probability: f64,

    /// Return prediction
    pub prediction: ReturnLabel,

    /// Top contributing factors, strongest first
    pub top_reasons: Vec<String>,

    /// True when attribution failed and the reasons are the generic set
    pub explanation_degraded: bool,

    /// Suggested discount
    pub discount: DiscountSuggestion,

    /// Suggested lower-return alternative
    pub alternative: AlternativeSuggestion,

    /// Assessment timestamp
    pub timestamp: DateTime<Utc>,
}

impl ReturnAssessment {
    /// Create a new assessment for an order
    pub fn new(
        order_id: Option<String>,
        product_category: String,
        return_probability: f64,
        prediction: ReturnLabel,
    ) -> Self {
        Self {
            assessment_id: uuid::Uuid::new_v4().to_string(),
            order_id,
            product_category,
            return_probability,
            prediction,
            top_reasons: Vec::new(),
            explanation_degraded: false,
            discount: DiscountSuggestion {
                discount_percent: 0,
                reason: String::new(),
            },
            alternative: AlternativeSuggestion {
                recommended_product: String::new(),
                reason: String::new(),
            },
            timestamp: Utc::now(),
        }
    }

    /// Add the explanation to the assessment
    pub fn with_reasons(mut self, reasons: Vec<String>, degraded: bool) -> Self {
        self.top_reasons = reasons;
        self.explanation_degraded = degraded;
        self
    }

    /// Add mitigation suggestions to the assessment
    pub fn with_mitigation(
        mut self,
        discount: DiscountSuggestion,
        alternative: AlternativeSuggestion,
    ) -> Self {
        self.discount = discount;
        self.alternative = alternative;
        self
    }

    pub fn is_predicted_return(&self) -> bool {
        self.prediction == ReturnLabel::Yes
    }
}
