// file: src/models/analysis.rs
// description: query classification output shared by routing and fusion
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which search paths a request ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Table,
    Text,
    Hybrid,
}

impl SearchType {
    pub fn runs_table(&self) -> bool {
        matches!(self, SearchType::Table | SearchType::Hybrid)
    }

    pub fn runs_text(&self) -> bool {
        matches!(self, SearchType::Text | SearchType::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Table => "table",
            SearchType::Text => "text",
            SearchType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Open label such as `sales_inquiry`, or `general` when nothing matched.
    pub query_type: String,
    /// In [0, 1].
    pub confidence: f32,
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_hint: Option<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl ClassificationResult {
    pub const DEFAULT_LABEL: &'static str = "general";

    /// Fallback used when classification cannot run: search everything.
    pub fn fallback() -> Self {
        Self {
            query_type: Self::DEFAULT_LABEL.to_string(),
            confidence: 0.0,
            search_type: SearchType::Hybrid,
            table_hint: None,
            matched_keywords: Vec::new(),
        }
    }
}
