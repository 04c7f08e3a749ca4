//! Return risk service handle.
//!
//! Built once at startup from the model artifacts and then shared read-only
//! (typically behind an `Arc`) by every request. The inference and
//! attribution engines are constructed from the same classifier instance,
//! so explanations always describe the model that produced the prediction.

use crate::config::{AppConfig, MitigationConfig, UnknownCategoryPolicy};
use crate::error::ServiceError;
use crate::feature_encoder::{AlignedVector, FeatureEncoder};
use crate::mitigation::MitigationAdvisor;
use crate::models::attribution::{AttributionEngine, Explanation, FeatureAttributor};
use crate::models::forest::TreeEnsemble;
use crate::models::inference::{InferenceEngine, Prediction};
use crate::models::loader::{check_compatible, ModelLoader};
use crate::schema::SchemaRegistry;
use crate::types::assessment::ReturnAssessment;
use crate::types::order::OrderRecord;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Immutable handle holding the schema, classifier and explainer.
pub struct ReturnRiskService {
    encoder: FeatureEncoder,
    inference: InferenceEngine,
    attribution: AttributionEngine,
    mitigation: MitigationAdvisor,
}

impl ReturnRiskService {
    /// Load the artifacts named in the configuration.
    ///
    /// Fails if any artifact is missing, corrupt or inconsistent; the
    /// service cannot serve anything without them.
    pub fn load(config: &AppConfig) -> Result<Self> {
        let artifacts = ModelLoader::new(&config.models).load()?;
        let service = Self::new(
            artifacts.schema,
            artifacts.forest,
            config.encoding.unknown_category,
            &config.mitigation,
        )?;

        info!(
            features = service.encoder.feature_count(),
            trees = service.inference.tree_count(),
            unknown_category = ?config.encoding.unknown_category,
            "Return risk service ready"
        );

        Ok(service)
    }

    /// Build a service from in-memory artifacts.
    pub fn new(
        schema: SchemaRegistry,
        forest: TreeEnsemble,
        unknown_category: UnknownCategoryPolicy,
        mitigation: &MitigationConfig,
    ) -> Result<Self> {
        check_compatible(&schema, &forest)?;

        let schema = Arc::new(schema);
        let forest = Arc::new(forest);

        Ok(Self {
            encoder: FeatureEncoder::new(schema, unknown_category),
            inference: InferenceEngine::new(Arc::clone(&forest)),
            attribution: AttributionEngine::tree_shap(forest),
            mitigation: MitigationAdvisor::new(mitigation),
        })
    }

    /// Replace the attributor, keeping everything else.
    pub fn with_attributor(mut self, attributor: Arc<dyn FeatureAttributor>) -> Self {
        self.attribution = AttributionEngine::new(attributor);
        self
    }

    /// Validate and encode an order.
    pub fn encode(&self, order: &OrderRecord) -> Result<AlignedVector, ServiceError> {
        order.validate()?;
        Ok(self.encoder.encode(order)?)
    }

    /// Return probability and label for an order.
    pub fn predict(&self, order: &OrderRecord) -> Result<Prediction, ServiceError> {
        let features = self.encode(order)?;
        Ok(self.inference.predict(&features)?)
    }

    /// Top three reasons behind an order's prediction.
    ///
    /// Only input validation can fail; attribution problems yield the
    /// fallback reasons.
    pub fn explain(&self, order: &OrderRecord) -> Result<Explanation, ServiceError> {
        let features = self.encode(order)?;
        Ok(self.attribution.explain(&features))
    }

    /// Prediction, explanation and mitigation suggestions in one pass.
    ///
    /// Discount tiers apply to the rounded probability the caller sees.
    pub fn assess(&self, order: &OrderRecord) -> Result<ReturnAssessment, ServiceError> {
        let features = self.encode(order)?;
        let prediction = self.inference.predict(&features)?;
        let explanation = self.attribution.explain(&features);

        Ok(ReturnAssessment::new(
            order.order_id.clone(),
            order.product_category.clone(),
            prediction.return_probability(),
            prediction.label,
        )
        .with_reasons(explanation.reasons().to_vec(), explanation.is_fallback())
        .with_mitigation(
            self.mitigation.discount(prediction.return_probability()),
            self.mitigation.alternative(&order.product_category),
        ))
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Baseline probability the explanations are measured from.
    pub fn expected_value(&self) -> f64 {
        self.attribution.expected_value()
    }
}
