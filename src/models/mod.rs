// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod analysis;
pub mod chunk;
pub mod request;
pub mod response;
pub mod search_result;

pub use analysis::{ClassificationResult, SearchType};
pub use chunk::DocumentChunk;
pub use request::{HybridSearchRequest, QaRequest};
pub use response::{
    AnswerRecord, BackendFailure, ErrorResponse, FusedResultSet, HybridSearchResponse,
    QaResponse, SourceCitation,
};
pub use search_result::{SearchItem, TableSearchResult, TextSearchResult};
