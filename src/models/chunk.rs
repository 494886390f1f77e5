// file: src/models/chunk.rs
// description: indexed document chunk model with content hashing
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One bounded slice of a source document, the unit stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    #[serde(default)]
    pub id: String,
    pub doc_id: String,
    pub doc_title: String,
    pub content: String,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    pub fn new(doc_id: String, doc_title: String, content: String) -> Self {
        let mut chunk = Self {
            id: String::new(),
            doc_id,
            doc_title,
            content,
            content_hash: String::new(),
            created_at: Utc::now(),
        };
        chunk.fill_derived_fields();
        chunk
    }

    /// Fills in the hash, and the id when the source did not provide one.
    pub fn fill_derived_fields(&mut self) {
        self.content_hash = Self::compute_hash(&self.content);
        if self.id.trim().is_empty() {
            let mut hasher = Sha256::new();
            hasher.update(self.doc_id.as_bytes());
            hasher.update(b":");
            hasher.update(self.content_hash.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            self.id = format!("{}:{}", self.doc_id, &digest[..16]);
        }
    }

    fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = DocumentChunk::new(
            "doc-1".to_string(),
            "취업 규칙".to_string(),
            "제1조 [목적] 본 규정은 근무 조건을 정한다.".to_string(),
        );

        assert!(chunk.id.starts_with("doc-1:"));
        assert_eq!(chunk.content_hash.len(), 64);
    }

    #[test]
    fn test_hash_consistency() {
        let content = "Test content";
        let hash1 = DocumentChunk::compute_hash(content);
        let hash2 = DocumentChunk::compute_hash(content);
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_jsonl_record_keeps_explicit_id() {
        let line = r#"{"id": "c-7", "doc_id": "d", "doc_title": "t", "content": "x", "created_at": "2024-03-01T00:00:00Z"}"#;
        let mut chunk: DocumentChunk = serde_json::from_str(line).unwrap();
        chunk.fill_derived_fields();
        assert_eq!(chunk.id, "c-7");
        assert!(!chunk.content_hash.is_empty());
        assert_eq!(chunk.created_at.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }
}
