//! Return Risk Pipeline Library
//!
//! Real-time retail return risk scoring: orders are one-hot encoded against
//! the training schema, scored by a tree ensemble and explained with TreeSHAP.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod mitigation;
pub mod models;
pub mod producer;
pub mod schema;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::OrderConsumer;
pub use error::{AttributionError, InferenceError, InputError, ServiceError};
pub use feature_encoder::{AlignedVector, FeatureEncoder};
pub use models::attribution::{AttributionEngine, Explanation};
pub use models::inference::{InferenceEngine, Prediction, ReturnLabel};
pub use producer::AssessmentProducer;
pub use schema::SchemaRegistry;
pub use service::ReturnRiskService;
pub use types::{assessment::ReturnAssessment, order::OrderRecord};
