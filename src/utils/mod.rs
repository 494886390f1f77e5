// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod keywords;
pub mod logging;
pub mod stats;
pub mod telemetry;
pub mod validation;

pub use stats::{SearchEvent, SearchStats, SearchTelemetry, SearchTypeCounts};
pub use telemetry::{HealthCheck, HealthReport, HealthStatus, OperationTimer};
pub use validation::Validator;
