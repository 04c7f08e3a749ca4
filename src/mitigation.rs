//! Return risk mitigation: discount tiers and lower-return alternatives.

use crate::config::MitigationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NO_ALTERNATIVE: &str = "No better alternative found for this category.";
const ALTERNATIVE_REASON: &str =
    "Recommended based on lower historical return rates in this category.";

/// Discount offered to offset return risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountSuggestion {
    pub discount_percent: u8,
    pub reason: String,
}

/// Alternative product with a lower historical return rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeSuggestion {
    pub recommended_product: String,
    pub reason: String,
}

/// Table-driven discount and alternative product lookups.
pub struct MitigationAdvisor {
    high_risk_percent: f64,
    very_high_risk_percent: f64,
    high_risk_discount: u8,
    very_high_risk_discount: u8,
    alternatives: HashMap<String, String>,
}

impl MitigationAdvisor {
    pub fn new(config: &MitigationConfig) -> Self {
        Self {
            high_risk_percent: config.high_risk_percent,
            very_high_risk_percent: config.very_high_risk_percent,
            high_risk_discount: config.high_risk_discount,
            very_high_risk_discount: config.very_high_risk_discount,
            alternatives: config
                .alternatives
                .iter()
                .map(|(category, product)| (category.to_lowercase(), product.clone()))
                .collect(),
        }
    }

    /// Discount for a return probability in [0, 1].
    ///
    /// Tiers are expressed in percent; both bounds are exclusive. The
    /// probability is compared at the 3-decimal precision it is reported
    /// with, so 0.7 is exactly 70 percent.
    pub fn discount(&self, return_probability: f64) -> DiscountSuggestion {
        let percent = (return_probability * 1000.0).round() / 10.0;
        if percent > self.very_high_risk_percent {
            DiscountSuggestion {
                discount_percent: self.very_high_risk_discount,
                reason: "Very high return risk".to_string(),
            }
        } else if percent > self.high_risk_percent {
            DiscountSuggestion {
                discount_percent: self.high_risk_discount,
                reason: "High return risk".to_string(),
            }
        } else {
            DiscountSuggestion {
                discount_percent: 0,
                reason: "No risk mitigation needed".to_string(),
            }
        }
    }

    /// Lower-return alternative for a product category.
    ///
    /// Categories match case-insensitively; config file keys may arrive lowercased.
    pub fn alternative(&self, category: &str) -> AlternativeSuggestion {
        match self.alternatives.get(&category.to_lowercase()) {
            Some(product) => AlternativeSuggestion {
                recommended_product: product.clone(),
                reason: ALTERNATIVE_REASON.to_string(),
            },
            None => AlternativeSuggestion {
                recommended_product: NO_ALTERNATIVE.to_string(),
                reason: ALTERNATIVE_REASON.to_string(),
            },
        }
    }
}

impl Default for MitigationAdvisor {
    fn default() -> Self {
        Self::new(&MitigationConfig::default())
    }
}
