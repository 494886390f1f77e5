// file: src/models/response.rs
// description: fused result sets and the response payloads built from them
// reference: internal data structures

use crate::error::SearchError;
use crate::models::analysis::{ClassificationResult, SearchType};
use crate::models::search_result::{SearchItem, TableSearchResult, TextSearchResult};
use crate::utils::validation::Validator;
use serde::{Deserialize, Serialize};

/// A search path that produced nothing for this request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub backend: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Ranked, deduplicated and truncated output of one search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResultSet {
    pub items: Vec<SearchItem>,
    pub total_count: usize,
    /// Seconds, rounded to milliseconds.
    pub search_time: f64,
    pub analysis: ClassificationResult,
    pub search_type: SearchType,
    pub degraded: bool,
    pub failures: Vec<BackendFailure>,
}

impl FusedResultSet {
    pub fn table_results(&self) -> Vec<TableSearchResult> {
        self.items
            .iter()
            .filter_map(|item| match item {
                SearchItem::Table(t) => Some(t.clone()),
                SearchItem::Text(_) => None,
            })
            .collect()
    }

    pub fn text_results(&self) -> Vec<TextSearchResult> {
        self.items
            .iter()
            .filter_map(|item| match item {
                SearchItem::Text(t) => Some(t.clone()),
                SearchItem::Table(_) => None,
            })
            .collect()
    }

    pub fn degraded_backends(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.backend.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchResponse {
    pub success: bool,
    pub message: String,
    pub query: String,
    pub search_type: SearchType,
    pub analysis: ClassificationResult,
    pub table_results: Vec<TableSearchResult>,
    pub text_results: Vec<TextSearchResult>,
    /// Both kinds in combined ranking order.
    pub results: Vec<SearchItem>,
    pub total_count: usize,
    pub search_time: f64,
    pub degraded: bool,
    pub degraded_backends: Vec<String>,
}

impl HybridSearchResponse {
    pub fn from_fused(query: &str, fused: FusedResultSet) -> Self {
        let mut message = format!(
            "Search complete: {} results ({:.3}s)",
            fused.total_count, fused.search_time
        );
        if fused.degraded {
            message.push_str(&format!(
                " - partial results, unavailable: {}",
                fused.degraded_backends().join(", ")
            ));
        }

        Self {
            success: true,
            message,
            query: query.to_string(),
            search_type: fused.search_type,
            table_results: fused.table_results(),
            text_results: fused.text_results(),
            degraded_backends: fused.degraded_backends(),
            total_count: fused.total_count,
            search_time: fused.search_time,
            degraded: fused.degraded,
            analysis: fused.analysis,
            results: fused.items,
        }
    }
}

/// A citation pointing back at one fused result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub rank: usize,
    pub result_id: String,
    pub kind: String,
    pub doc_id: Option<String>,
    pub doc_title: Option<String>,
    pub content_preview: String,
    pub similarity_score: f32,
}

impl SourceCitation {
    pub const PREVIEW_CHARS: usize = 200;

    pub fn from_item(rank: usize, item: &SearchItem) -> Self {
        Self {
            rank,
            result_id: item.id().to_string(),
            kind: item.kind().to_string(),
            doc_id: item.doc_id().map(str::to_string),
            doc_title: item.doc_title().map(str::to_string),
            content_preview: Validator::truncate_text(&item.passage_text(), Self::PREVIEW_CHARS),
            similarity_score: item.score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// `None` when generation failed.
    pub answer: Option<String>,
    pub summary: Option<String>,
    pub sources: Vec<SourceCitation>,
    pub confidence_score: f32,
    pub answer_generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResponse {
    pub success: bool,
    pub question: String,
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
    pub search_results: Vec<SearchItem>,
    pub total_sources: usize,
    pub confidence_score: f32,
    pub answer_generated: bool,
    pub degraded: bool,
    pub degraded_backends: Vec<String>,
}

impl QaResponse {
    pub fn new(
        question: &str,
        fused: FusedResultSet,
        answer: AnswerRecord,
        include_summary: bool,
        include_sources: bool,
    ) -> Self {
        Self {
            success: true,
            question: question.to_string(),
            answer: answer.answer,
            summary: if include_summary { answer.summary } else { None },
            sources: include_sources.then_some(answer.sources),
            total_sources: fused.total_count,
            confidence_score: answer.confidence_score,
            answer_generated: answer.answer_generated,
            degraded: fused.degraded,
            degraded_backends: fused.degraded_backends(),
            search_results: fused.items,
        }
    }
}

/// Body returned for requests that fail outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_kind: String,
    pub status_code: u16,
}

impl From<&SearchError> for ErrorResponse {
    fn from(err: &SearchError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            error_kind: err.kind().to_string(),
            status_code: err.status_code(),
        }
    }
}
