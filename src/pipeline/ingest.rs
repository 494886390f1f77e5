// file: src/pipeline/ingest.rs
// description: JSONL chunk loading and batched embedding + insertion into the semantic index
// reference: batch processing pattern from the document pipeline

use crate::database::client::LanceDbClient;
use crate::database::embeddings::EmbeddingProvider;
use crate::database::insert::ChunkInserter;
use crate::error::Result;
use crate::models::DocumentChunk;
use crate::pipeline::progress::{IngestProgress, IngestStats};
use crate::utils::telemetry::OperationTimer;
use crate::utils::validation::Validator;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Chunks parsed from a JSONL file plus the number of lines that were dropped.
#[derive(Debug, Default)]
pub struct LoadedChunks {
    pub chunks: Vec<DocumentChunk>,
    pub skipped: usize,
}

/// One chunk per line: `{"doc_id", "doc_title", "content"}` with optional
/// `id` and `created_at`. Blank lines are ignored; malformed or empty ones
/// are skipped with a warning.
pub fn read_chunks_jsonl(path: &Path) -> Result<LoadedChunks> {
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = LoadedChunks::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut chunk: DocumentChunk = match serde_json::from_str(&line) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Skipping line {}: {}", idx + 1, e);
                loaded.skipped += 1;
                continue;
            }
        };

        if let Err(e) = Validator::validate_content_not_empty(&chunk.content) {
            warn!("Skipping line {}: {}", idx + 1, e);
            loaded.skipped += 1;
            continue;
        }

        chunk.fill_derived_fields();
        loaded.chunks.push(chunk);
    }

    info!(
        "Loaded {} chunks from {} ({} skipped)",
        loaded.chunks.len(),
        path.display(),
        loaded.skipped
    );
    Ok(loaded)
}

pub struct ChunkIngestor<'a> {
    client: &'a LanceDbClient,
    inserter: ChunkInserter<'a>,
}

impl<'a> ChunkIngestor<'a> {
    pub fn new(client: &'a LanceDbClient, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            client,
            inserter: ChunkInserter::new(client, embedder),
        }
    }

    /// Inserts `chunks` in batches of the configured size. A failed batch is
    /// counted and skipped. With `replace`, existing chunks of every incoming
    /// document are deleted first.
    pub async fn ingest(
        &self,
        chunks: &[DocumentChunk],
        replace: bool,
        progress: &IngestProgress,
    ) -> Result<IngestStats> {
        let batch_size = self.client.batch_size();
        Validator::validate_batch_size(batch_size)?;
        let timer = OperationTimer::new("chunk ingestion");

        let mut documents_replaced = 0;
        if replace {
            let doc_ids: BTreeSet<&str> = chunks.iter().map(|c| c.doc_id.as_str()).collect();
            for doc_id in doc_ids {
                progress.set_message(format!("Replacing {}", doc_id));
                self.client.delete_by_doc_id(doc_id).await?;
                documents_replaced += 1;
            }
        }

        for batch in chunks.chunks(batch_size) {
            match self.inserter.insert_batch(batch).await {
                Ok(count) => progress.batch_inserted(count),
                Err(e) => {
                    warn!("Batch of {} chunks failed: {}", batch.len(), e);
                    progress.batch_failed(batch.len());
                }
            }
        }

        let mut stats = progress.get_stats();
        stats.chunks_read = chunks.len();
        stats.documents_replaced = documents_replaced;
        timer.finish_with_count(stats.chunks_inserted);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::embeddings::HashingEmbedder;
    use std::io::Write;

    fn db_config(dir: &Path) -> DatabaseConfig {
        DatabaseConfig {
            uri: dir.join("lancedb").to_string_lossy().to_string(),
            table_name: "document_chunks".to_string(),
            batch_size: 2,
            embedding_dim: 32,
            retry_attempts: 1,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 1,
        }
    }

    fn write_jsonl(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("chunks.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"doc_id": "rules", "doc_title": "취업 규칙", "content": "연차 휴가는 15일이다."}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(
            file,
            r#"{{"doc_id": "rules", "doc_title": "취업 규칙", "content": "   "}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"id": "r-2", "doc_id": "rules", "doc_title": "취업 규칙", "content": "병가는 연 10일이다.", "created_at": "2024-03-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"doc_id": "report", "doc_title": "분기 보고서", "content": "1분기 매출 증가"}}"#
        )
        .unwrap();
        path
    }

    #[test]
    fn test_read_jsonl_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = read_chunks_jsonl(&write_jsonl(dir.path())).unwrap();

        assert_eq!(loaded.chunks.len(), 3);
        assert_eq!(loaded.skipped, 2);
        assert_eq!(loaded.chunks[1].id, "r-2");
        assert!(loaded.chunks[0].id.starts_with("rules:"));
        assert!(loaded.chunks.iter().all(|c| c.content_hash.len() == 64));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_chunks_jsonl(&dir.path().join("missing.jsonl")).is_err());
    }

    #[tokio::test]
    async fn test_ingest_batches_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = read_chunks_jsonl(&write_jsonl(dir.path())).unwrap();
        let client = LanceDbClient::new(db_config(dir.path())).await.unwrap();
        let ingestor = ChunkIngestor::new(&client, Arc::new(HashingEmbedder::new(32)));

        let stats = ingestor
            .ingest(&loaded.chunks, false, &IngestProgress::hidden())
            .await
            .unwrap();
        assert_eq!(stats.chunks_inserted, 3);
        assert_eq!(stats.batches, 2);
        assert_eq!(client.chunk_count().await.unwrap(), 3);

        let stats = ingestor
            .ingest(&loaded.chunks, true, &IngestProgress::hidden())
            .await
            .unwrap();
        assert_eq!(stats.documents_replaced, 2);
        assert_eq!(client.chunk_count().await.unwrap(), 3);
    }
}
