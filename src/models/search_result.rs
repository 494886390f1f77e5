// file: src/models/search_result.rs
// description: table and text search hits with similarity scores
// reference: Used for structured and vector similarity search results

use crate::utils::validation::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A row from the structured store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSearchResult {
    pub id: String,

    /// Document the row was extracted from, if recorded
    pub doc_id: Option<String>,

    /// Table the row came from (e.g. `sales_records`)
    pub table_type: String,

    /// Column name to value
    pub content: Map<String, Value>,

    pub created_at: Option<DateTime<Utc>>,

    /// Similarity score in [0, 1]
    pub similarity_score: f32,

    pub source: String,
}

/// A chunk from the semantic index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearchResult {
    /// Chunk ID
    pub id: String,

    pub doc_id: String,

    pub doc_title: String,

    /// Chunk text
    pub content: String,

    pub created_at: Option<DateTime<Utc>>,

    /// Similarity score in [0, 1]
    pub similarity_score: f32,

    pub source: String,
}

/// Either kind of hit, tagged with `"type"` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchItem {
    Table(TableSearchResult),
    Text(TextSearchResult),
}

impl TableSearchResult {
    pub const SOURCE: &'static str = "text2sql_search";

    /// Render the row as `key: value` pairs for previews and prompts.
    pub fn content_text(&self) -> String {
        self.content
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TextSearchResult {
    pub const SOURCE: &'static str = "vector_index";

    /// Format as a summary string for display
    pub fn format_summary(&self, max_content_len: usize) -> String {
        format!(
            "Score: {:.4} | {} ({})\n{}\n",
            self.similarity_score,
            self.doc_title,
            self.doc_id,
            Validator::truncate_text(&self.content, max_content_len)
        )
    }
}

impl SearchItem {
    pub fn id(&self) -> &str {
        match self {
            SearchItem::Table(t) => &t.id,
            SearchItem::Text(t) => &t.id,
        }
    }

    pub fn doc_id(&self) -> Option<&str> {
        match self {
            SearchItem::Table(t) => t.doc_id.as_deref(),
            SearchItem::Text(t) => Some(t.doc_id.as_str()),
        }
        .filter(|id| !id.is_empty())
    }

    pub fn doc_title(&self) -> Option<&str> {
        match self {
            SearchItem::Table(_) => None,
            SearchItem::Text(t) => Some(t.doc_title.as_str()),
        }
    }

    pub fn score(&self) -> f32 {
        match self {
            SearchItem::Table(t) => t.similarity_score,
            SearchItem::Text(t) => t.similarity_score,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SearchItem::Table(t) => t.created_at,
            SearchItem::Text(t) => t.created_at,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SearchItem::Table(_) => "table",
            SearchItem::Text(_) => "text",
        }
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self, SearchItem::Text(_))
    }

    /// Text handed to answer generation.
    pub fn passage_text(&self) -> String {
        match self {
            SearchItem::Table(t) => format!("[{}] {}", t.table_type, t.content_text()),
            SearchItem::Text(t) => t.content.clone(),
        }
    }

    /// Ranking order: score descending, newest first, chunks before rows, id ascending.
    pub fn rank_cmp(a: &SearchItem, b: &SearchItem) -> Ordering {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at().cmp(&a.created_at()))
            .then_with(|| b.is_chunk().cmp(&a.is_chunk()))
            .then_with(|| a.id().cmp(b.id()))
    }
}

impl From<TableSearchResult> for SearchItem {
    fn from(result: TableSearchResult) -> Self {
        SearchItem::Table(result)
    }
}

impl From<TextSearchResult> for SearchItem {
    fn from(result: TextSearchResult) -> Self {
        SearchItem::Text(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn text(id: &str, score: f32, ts: Option<i64>) -> SearchItem {
        SearchItem::Text(TextSearchResult {
            id: id.to_string(),
            doc_id: "doc-1".to_string(),
            doc_title: "Quarterly report".to_string(),
            content: "본 보고서는 2024년 매출 현황을 다룹니다.".to_string(),
            created_at: ts.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            similarity_score: score,
            source: TextSearchResult::SOURCE.to_string(),
        })
    }

    #[test]
    fn test_rank_cmp_prefers_score_then_recency() {
        let mut items = vec![
            text("a", 0.5, Some(100)),
            text("b", 0.9, Some(100)),
            text("c", 0.5, Some(200)),
            text("d", 0.5, None),
        ];
        items.sort_by(SearchItem::rank_cmp);
        let ids: Vec<&str> = items.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_tagged_serialization() {
        let mut content = Map::new();
        content.insert("month".to_string(), json!("2024-01"));
        content.insert("sales".to_string(), json!(1500000));
        let item = SearchItem::Table(TableSearchResult {
            id: "1".to_string(),
            doc_id: None,
            table_type: "sales_records".to_string(),
            content,
            created_at: None,
            similarity_score: 0.95,
            source: TableSearchResult::SOURCE.to_string(),
        });

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "table");
        assert_eq!(value["content"]["sales"], 1500000);
        assert_eq!(item.doc_id(), None);
    }

    #[test]
    fn test_format_summary_is_char_safe() {
        let SearchItem::Text(result) = text("a", 0.8765, None) else {
            unreachable!()
        };
        let summary = result.format_summary(5);
        assert!(summary.contains("0.8765"));
        assert!(summary.contains("Quarterly report"));
        assert!(summary.contains("..."));
    }
}
