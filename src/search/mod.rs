// file: src/search/mod.rs
// description: hybrid search pipeline: routing, adapters, fusion, orchestration
// reference: internal module structure

pub mod classifier;
pub mod engine;
pub mod fusion;
pub mod retry;
pub mod semantic;
pub mod sql_planner;
pub mod structured;

pub use classifier::QueryClassifier;
pub use engine::HybridSearchEngine;
pub use fusion::{AdapterOutcome, ResultFusion};
pub use retry::RetryPolicy;
pub use semantic::{SemanticSearch, VectorSearch};
pub use sql_planner::{KeywordSqlPlanner, LlmSqlPlanner, SqlPlan, SqlPlanner};
pub use structured::{StructuredSearch, Text2SqlSearch};
