//! Schema registry: the ordered feature columns the classifier was fitted on.
//!
//! The registry is loaded once from the artifact written at training time
//! and never changes afterwards. It also carries the categorical
//! vocabularies so serving encodes categories exactly as training did.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

pub const CATEGORY_FIELD: &str = "Product_Category";
pub const SIZE_FIELD: &str = "Product_Size";
pub const REGION_FIELD: &str = "Customer_Region";
pub const AGE_GROUP_FIELD: &str = "Customer_Age_Group";

pub const PAST_RETURNS_FIELD: &str = "Past_Return_Count";
pub const RATING_FIELD: &str = "Product_Rating";
pub const DELIVERY_DAYS_FIELD: &str = "Delivery_Time_Days";

/// Categorical fields, in the order their indicator blocks are expanded.
pub const CATEGORICAL_FIELDS: [&str; 4] =
    [CATEGORY_FIELD, SIZE_FIELD, REGION_FIELD, AGE_GROUP_FIELD];

/// Name of the one-hot indicator column for a categorical value.
pub fn indicator_column(field: &str, value: &str) -> String {
    format!("{}_{}", field, value)
}

/// On-disk form of the registry.
///
/// Older training runs wrote a bare column list; newer ones persist the
/// vocabularies next to it.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum SchemaArtifact {
    Columns(Vec<String>),
    Full {
        columns: Vec<String>,
        #[serde(default)]
        vocabularies: BTreeMap<String, Vec<String>>,
    },
}

/// Ordered, deduplicated list of encoded feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    vocabularies: BTreeMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// Build a registry from a column list, deriving vocabularies from the
    /// indicator column prefixes.
    pub fn from_columns(columns: Vec<String>) -> Result<Self> {
        let vocabularies = derive_vocabularies(&columns);
        Self::with_vocabularies(columns, vocabularies)
    }

    /// Build a registry from a column list and explicit vocabularies.
    ///
    /// Each categorical field's vocabulary must name exactly the indicator
    /// columns present for that field, no more and no fewer.
    pub fn with_vocabularies(
        columns: Vec<String>,
        vocabularies: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        if columns.is_empty() {
            bail!("schema has no columns");
        }

        let mut positions = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), idx).is_some() {
                bail!("duplicate schema column {:?}", column);
            }
        }

        for (field, values) in &vocabularies {
            for value in values {
                let column = indicator_column(field, value);
                if !positions.contains_key(&column) {
                    bail!(
                        "vocabulary value {:?} for {} has no schema column {:?}",
                        value,
                        field,
                        column
                    );
                }
            }
        }

        for (field, present) in derive_vocabularies(&columns) {
            let known = vocabularies.get(&field).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(value) = present.iter().find(|value| !known.contains(value)) {
                bail!(
                    "schema column {:?} is missing from the {} vocabulary",
                    indicator_column(&field, value),
                    field
                );
            }
        }

        Ok(Self {
            columns,
            positions,
            vocabularies,
        })
    }

    /// Load the registry from a JSON artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema from {}", path.display()))?;
        let artifact: SchemaArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse schema {}", path.display()))?;

        let registry = match artifact {
            SchemaArtifact::Columns(columns) => Self::from_columns(columns),
            SchemaArtifact::Full {
                columns,
                vocabularies,
            } if vocabularies.is_empty() => Self::from_columns(columns),
            SchemaArtifact::Full {
                columns,
                vocabularies,
            } => Self::with_vocabularies(columns, vocabularies),
        }
        .with_context(|| format!("Invalid schema {}", path.display()))?;

        info!(
            path = %path.display(),
            columns = registry.len(),
            "Schema registry loaded"
        );

        Ok(registry)
    }

    /// Columns in model input order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of a column in the model input.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Known values of a categorical field.
    pub fn vocabulary(&self, field: &str) -> Option<&[String]> {
        self.vocabularies.get(field).map(Vec::as_slice)
    }

    /// Whether a categorical value was seen at training time.
    pub fn is_known(&self, field: &str, value: &str) -> bool {
        self.vocabulary(field)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false)
    }
}

fn derive_vocabularies(columns: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut vocabularies: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for column in columns {
        for field in CATEGORICAL_FIELDS {
            if let Some(value) = column
                .strip_prefix(field)
                .and_then(|rest| rest.strip_prefix('_'))
            {
                vocabularies
                    .entry(field.to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
    }
    vocabularies
}
