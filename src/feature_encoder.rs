//! Feature encoding for return risk model inference.
//!
//! Orders are one-hot encoded the way the training pipeline encoded them,
//! then aligned to the schema registry so the classifier always sees the
//! exact column layout it was fitted on.

use crate::config::UnknownCategoryPolicy;
use crate::error::InputError;
use crate::schema::{indicator_column, SchemaRegistry};
use crate::types::order::OrderRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Numeric feature vector in schema column order.
///
/// Only the encoder builds these, so the column set and order always match
/// the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedVector {
    schema: Arc<SchemaRegistry>,
    values: Vec<f64>,
}

impl AlignedVector {
    /// Feature values in model input order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column names, parallel to [`values`](Self::values).
    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.position(column).map(|idx| self.values[idx])
    }

    /// (column, value) pairs in model input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Bypass alignment. Only for exercising shape checks downstream.
    #[cfg(test)]
    pub(crate) fn from_raw_parts(schema: Arc<SchemaRegistry>, values: Vec<f64>) -> Self {
        Self { schema, values }
    }
}

/// Encoder that transforms orders into aligned model input vectors.
pub struct FeatureEncoder {
    schema: Arc<SchemaRegistry>,
    unknown_category: UnknownCategoryPolicy,
}

impl FeatureEncoder {
    /// Create an encoder bound to a schema registry.
    pub fn new(schema: Arc<SchemaRegistry>, unknown_category: UnknownCategoryPolicy) -> Self {
        Self {
            schema,
            unknown_category,
        }
    }

    /// Encode an order.
    ///
    /// Numeric fields pass through, each categorical field becomes one
    /// indicator column, then the result is aligned to the registry:
    /// missing columns are zero and columns the registry does not know are
    /// dropped. Under the lenient policy an unknown category value
    /// therefore leaves its whole indicator block at zero.
    pub fn encode(&self, order: &OrderRecord) -> Result<AlignedVector, InputError> {
        let mut expanded: HashMap<String, f64> = HashMap::with_capacity(8);

        for (column, value) in order.numeric_values() {
            expanded.insert(column.to_string(), value);
        }

        for (field, value) in order.categorical_values() {
            if !self.schema.is_known(field, value) {
                match self.unknown_category {
                    UnknownCategoryPolicy::Strict => {
                        return Err(InputError::UnknownCategory {
                            field,
                            value: value.to_string(),
                        });
                    }
                    UnknownCategoryPolicy::Lenient => {
                        debug!(field = field, value = %value, "Unknown category value encoded as all zeros");
                    }
                }
            }
            expanded.insert(indicator_column(field, value), 1.0);
        }

        Ok(self.align(&expanded))
    }

    fn align(&self, expanded: &HashMap<String, f64>) -> AlignedVector {
        let values = self
            .schema
            .columns()
            .iter()
            .map(|column| expanded.get(column).copied().unwrap_or(0.0))
            .collect();

        AlignedVector {
            schema: Arc::clone(&self.schema),
            values,
        }
    }

    /// Number of features produced.
    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    /// Feature names in model input order.
    pub fn feature_names(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }
}
