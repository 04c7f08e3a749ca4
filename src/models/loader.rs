//! Model artifact loader

use crate::config::ModelsConfig;
use crate::models::forest::TreeEnsemble;
use crate::schema::SchemaRegistry;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Classifier and schema registry, checked against each other
pub struct LoadedArtifacts {
    pub schema: SchemaRegistry,
    pub forest: TreeEnsemble,
}

/// Loader for the serving artifacts written at training time
pub struct ModelLoader {
    classifier_path: PathBuf,
    schema_path: PathBuf,
}

impl ModelLoader {
    /// Create a loader for the configured artifact locations
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            classifier_path: config.classifier_path(),
            schema_path: config.schema_path(),
        }
    }

    /// Create a loader for explicit artifact paths
    pub fn with_paths<P: AsRef<Path>, Q: AsRef<Path>>(classifier_path: P, schema_path: Q) -> Self {
        Self {
            classifier_path: classifier_path.as_ref().to_path_buf(),
            schema_path: schema_path.as_ref().to_path_buf(),
        }
    }

    /// Load every artifact. Any failure here means the service cannot start.
    pub fn load(&self) -> Result<LoadedArtifacts> {
        info!(
            classifier = %self.classifier_path.display(),
            schema = %self.schema_path.display(),
            "Loading model artifacts"
        );

        let schema = SchemaRegistry::load(&self.schema_path)?;
        let forest = TreeEnsemble::load(&self.classifier_path)?;
        check_compatible(&schema, &forest).with_context(|| {
            format!(
                "Classifier {} does not match schema {}",
                self.classifier_path.display(),
                self.schema_path.display()
            )
        })?;

        info!(
            features = schema.len(),
            trees = forest.trees.len(),
            "Model artifacts loaded successfully"
        );

        Ok(LoadedArtifacts { schema, forest })
    }
}

/// The classifier must have been fitted on exactly the registry's columns.
pub fn check_compatible(schema: &SchemaRegistry, forest: &TreeEnsemble) -> Result<()> {
    if schema.len() != forest.n_features {
        bail!(
            "schema has {} columns but classifier expects {} features",
            schema.len(),
            forest.n_features
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SCHEMA: &str = r#"["Past_Return_Count", "Product_Rating", "Product_Size_M"]"#;

    const CLASSIFIER: &str = r#"{
        "n_features": 3,
        "trees": [{"nodes": [
            {"kind": "split", "feature": 1, "threshold": 3.0, "left": 1, "right": 2, "cover": 10},
            {"kind": "leaf", "value": 0.9, "cover": 3},
            {"kind": "leaf", "value": 0.1, "cover": 7}
        ]}]
    }"#;

    fn write_artifacts(dir: &Path, schema: &str, classifier: &str) -> ModelLoader {
        let schema_path = dir.join("input_columns.json");
        let classifier_path = dir.join("return_classifier.json");
        fs::write(&schema_path, schema).unwrap();
        fs::write(&classifier_path, classifier).unwrap();
        ModelLoader::with_paths(classifier_path, schema_path)
    }

    #[test]
    fn test_load_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_artifacts(dir.path(), SCHEMA, CLASSIFIER).load().unwrap();

        assert_eq!(artifacts.schema.len(), 3);
        assert_eq!(artifacts.forest.trees.len(), 1);
    }

    #[test]
    fn test_missing_classifier_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("input_columns.json"), SCHEMA).unwrap();
        let loader = ModelLoader::with_paths(
            dir.path().join("missing.json"),
            dir.path().join("input_columns.json"),
        );

        let err = loader.load().err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to read classifier"));
    }

    #[test]
    fn test_corrupt_schema_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = write_artifacts(dir.path(), "{not json", CLASSIFIER);
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_width_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = write_artifacts(dir.path(), r#"["Product_Rating", "Product_Size_M"]"#, CLASSIFIER);

        let err = loader.load().err().unwrap();
        assert!(format!("{:#}", err).contains("does not match schema"));
    }
}
