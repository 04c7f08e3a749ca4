//! Configuration management for the return risk pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How the encoder treats a category value that was not seen at training time
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategoryPolicy {
    /// Encode the value as an all-zero indicator block
    #[default]
    Lenient,
    /// Reject the order
    Strict,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub mitigation: MitigationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming orders
    pub order_subject: String,
    /// Subject for outgoing assessments when the order carries no reply subject
    pub assessment_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the model artifacts
    pub models_dir: String,
    /// Tree ensemble classifier file name
    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,
    /// Schema registry file name
    #[serde(default = "default_schema_file")]
    pub schema_file: String,
}

fn default_classifier_file() -> String {
    "return_classifier.json".to_string()
}

fn default_schema_file() -> String {
    "input_columns.json".to_string()
}

impl ModelsConfig {
    pub fn classifier_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.classifier_file)
    }

    pub fn schema_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.schema_file)
    }
}

/// Feature encoding configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncodingConfig {
    #[serde(default)]
    pub unknown_category: UnknownCategoryPolicy,
}

/// Discount and alternative product configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MitigationConfig {
    /// Return probability (percent) above which the high risk discount applies
    #[serde(default = "default_high_risk_percent")]
    pub high_risk_percent: f64,
    /// Return probability (percent) above which the very high risk discount applies
    #[serde(default = "default_very_high_risk_percent")]
    pub very_high_risk_percent: f64,
    #[serde(default = "default_high_risk_discount")]
    pub high_risk_discount: u8,
    #[serde(default = "default_very_high_risk_discount")]
    pub very_high_risk_discount: u8,
    /// Lower-return alternative per product category
    #[serde(default = "default_alternatives")]
    pub alternatives: HashMap<String, String>,
}

fn default_high_risk_percent() -> f64 {
    70.0
}

fn default_very_high_risk_percent() -> f64 {
    90.0
}

fn default_high_risk_discount() -> u8 {
    10
}

fn default_very_high_risk_discount() -> u8 {
    20
}

fn default_alternatives() -> HashMap<String, String> {
    let mut alternatives = HashMap::new();
    alternatives.insert(
        "Shoes".to_string(),
        "Shoes with adjustable sizes and flexible returns".to_string(),
    );
    alternatives.insert(
        "Laptops".to_string(),
        "Laptop with extended warranty and fewer complaints".to_string(),
    );
    alternatives.insert(
        "Shirts".to_string(),
        "Stretchable or free-size Shirts with positive reviews".to_string(),
    );
    alternatives
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            high_risk_percent: default_high_risk_percent(),
            very_high_risk_percent: default_very_high_risk_percent(),
            high_risk_discount: default_high_risk_discount(),
            very_high_risk_discount: default_very_high_risk_discount(),
            alternatives: default_alternatives(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum orders scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                order_subject: "orders.returns".to_string(),
                assessment_subject: "returns.assessments".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                classifier_file: default_classifier_file(),
                schema_file: default_schema_file(),
            },
            encoding: EncodingConfig::default(),
            mitigation: MitigationConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.order_subject, "orders.returns");
        assert_eq!(config.encoding.unknown_category, UnknownCategoryPolicy::Lenient);
        assert_eq!(config.mitigation.very_high_risk_discount, 20);
        assert_eq!(config.mitigation.alternatives.len(), 3);
        assert_eq!(
            config.models.classifier_path(),
            Path::new("models").join("return_classifier.json")
        );
    }

    #[test]
    fn test_load_from_path_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
order_subject = "orders"
assessment_subject = "assessments"

[models]
models_dir = "/srv/models"

[encoding]
unknown_category = "strict"

[pipeline]
workers = 8

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.nats.order_subject, "orders");
        assert_eq!(config.models.schema_file, "input_columns.json");
        assert_eq!(config.encoding.unknown_category, UnknownCategoryPolicy::Strict);
        assert_eq!(config.mitigation.high_risk_percent, 70.0);
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(config.nats.url, defaults.nats.url);
        assert_eq!(config.nats.assessment_subject, defaults.nats.assessment_subject);
        assert_eq!(config.models.models_dir, defaults.models.models_dir);
        assert_eq!(config.pipeline.workers, defaults.pipeline.workers);
        assert_eq!(config.mitigation.alternatives.len(), 3);
    }
}
