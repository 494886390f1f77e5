// file: src/models/request.rs
// description: hybrid search and question answering request payloads
// reference: internal data structures

use crate::config::SearchConfig;
use crate::error::Result;
use crate::utils::validation::Validator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl HybridSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Checks the query and returns the limit to use.
    pub fn validate(&self, settings: &SearchConfig) -> Result<usize> {
        Validator::validate_query_text("query", &self.query, settings.max_query_chars)?;
        let limit = self.limit.unwrap_or(settings.default_limit);
        Validator::validate_limit("limit", limit, settings.max_limit)?;
        Ok(limit)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default = "default_true")]
    pub include_summary: bool,
    #[serde(default = "default_true")]
    pub include_sources: bool,
}

impl QaRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            include_summary: true,
            include_sources: true,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Checks the question and returns the `top_k` to use.
    pub fn validate(&self, settings: &SearchConfig) -> Result<usize> {
        Validator::validate_query_text("question", &self.question, settings.max_query_chars)?;
        let top_k = self.top_k.unwrap_or(settings.default_top_k);
        Validator::validate_limit("top_k", top_k, settings.max_limit)?;
        Ok(top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::SearchError;

    fn settings() -> SearchConfig {
        Config::default_config().search
    }

    #[test]
    fn test_question_length_boundaries() {
        let settings = settings();

        let empty = QaRequest::new("");
        assert!(matches!(
            empty.validate(&settings),
            Err(SearchError::Validation(_))
        ));

        let at_limit = QaRequest::new("가".repeat(1000));
        assert_eq!(at_limit.validate(&settings).unwrap(), 5);

        let over_limit = QaRequest::new("가".repeat(1001));
        assert!(matches!(
            over_limit.validate(&settings),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_top_k_range() {
        let settings = settings();
        assert!(QaRequest::new("q").with_top_k(0).validate(&settings).is_err());
        assert!(QaRequest::new("q").with_top_k(21).validate(&settings).is_err());
        assert_eq!(QaRequest::new("q").with_top_k(20).validate(&settings).unwrap(), 20);
    }

    #[test]
    fn test_search_limit_defaults_to_twenty() {
        let settings = settings();
        let request = HybridSearchRequest::new("매출 현황");
        assert_eq!(request.validate(&settings).unwrap(), 20);
        assert!(HybridSearchRequest::new("   ").validate(&settings).is_err());
    }

    #[test]
    fn test_qa_request_defaults_from_json() {
        let request: QaRequest = serde_json::from_str(r#"{"question": "휴가 규정은?"}"#).unwrap();
        assert!(request.include_summary);
        assert!(request.include_sources);
        assert_eq!(request.top_k, None);
    }
}
