//! Type definitions for the return risk pipeline

pub mod assessment;
pub mod order;

pub use assessment::ReturnAssessment;
pub use order::OrderRecord;
