// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod qa;
pub mod search;
pub mod utils;

pub use config::{Config, DatabaseConfig, SearchConfig};
pub use database::{
    ChunkInserter, EmbeddingProvider, GroqEmbeddingClient, HashingEmbedder, LanceDbClient,
    SchemaManager, SqliteClient,
};
pub use error::{Result, SearchError};
pub use models::{
    ClassificationResult, DocumentChunk, HybridSearchRequest, HybridSearchResponse, QaRequest,
    QaResponse, SearchItem, SearchType, TableSearchResult, TextSearchResult,
};
pub use qa::{AnswerGenerator, ExtractiveGenerator, QaService};
pub use search::{HybridSearchEngine, QueryClassifier, SemanticSearch, StructuredSearch};
pub use utils::{
    HealthCheck, HealthReport, HealthStatus, OperationTimer, SearchStats, SearchTelemetry,
    Validator,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        let analysis = QueryClassifier::new(&config.classifier).classify("매출 현황");
        assert_eq!(analysis.search_type, SearchType::Hybrid);
    }
}
