// file: src/database/insert.rs
// description: LanceDB batch insertion of document chunks with embeddings
// reference: https://docs.rs/lancedb

use crate::database::client::LanceDbClient;
use crate::database::embeddings::EmbeddingProvider;
use crate::database::schema::SchemaManager;
use crate::error::{Result, SearchError};
use crate::models::DocumentChunk;
use arrow_array::{
    FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ChunkInserter<'a> {
    client: &'a LanceDbClient,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl<'a> ChunkInserter<'a> {
    pub fn new(client: &'a LanceDbClient, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        info!("ChunkInserter initialized with {} embeddings", embedder.name());
        Self { client, embedder }
    }

    /// Embeds and stores one batch, creating the table on first use.
    pub async fn insert_batch(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let dim = self.client.embedding_dim();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(SearchError::EmbeddingUnavailable(format!(
                "{} returned embedding with dimension {}, index expects {}",
                self.embedder.name(),
                bad.len(),
                dim
            )));
        }

        let schema = SchemaManager::get_chunks_schema(dim);
        let record_batch = Self::create_record_batch(schema.clone(), chunks, &embeddings, dim)?;
        let table_name = self.client.table_name();

        if !self.client.table_exists(table_name).await? {
            self.client
                .get_connection()
                .create_table(
                    table_name,
                    RecordBatchIterator::new(vec![Ok(record_batch)], schema.clone()),
                )
                .execute()
                .await
                .map_err(|e| SearchError::Database(format!("Failed to create table: {}", e)))?;
            info!("Created new table: {}", table_name);
        } else {
            let table = self.client.get_table(table_name).await?;
            table
                .add(RecordBatchIterator::new(vec![Ok(record_batch)], schema))
                .execute()
                .await
                .map_err(|e| SearchError::Database(format!("Failed to insert chunks: {}", e)))?;
        }

        debug!("Inserted {} chunks into {}", chunks.len(), table_name);
        Ok(chunks.len())
    }

    fn create_record_batch(
        schema: Arc<arrow_schema::Schema>,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        dim: usize,
    ) -> Result<RecordBatch> {
        let ids: StringArray = chunks.iter().map(|c| Some(c.id.as_str())).collect();
        let doc_ids: StringArray = chunks.iter().map(|c| Some(c.doc_id.as_str())).collect();
        let doc_titles: StringArray = chunks.iter().map(|c| Some(c.doc_title.as_str())).collect();
        let contents: StringArray = chunks.iter().map(|c| Some(c.content.as_str())).collect();
        let content_hashes: StringArray = chunks
            .iter()
            .map(|c| Some(c.content_hash.as_str()))
            .collect();
        let created_ats: UInt64Array = chunks
            .iter()
            .map(|c| Some(c.created_at.timestamp_millis().max(0) as u64))
            .collect();

        let embedding_values: Float32Array = embeddings
            .iter()
            .flat_map(|emb| emb.iter().copied())
            .collect();

        let embedding_list = FixedSizeListArray::try_new(
            Arc::new(arrow_schema::Field::new(
                "item",
                arrow_schema::DataType::Float32,
                true,
            )),
            dim as i32,
            Arc::new(embedding_values),
            None,
        )
        .map_err(|e| SearchError::Database(format!("Failed to create embedding array: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(doc_ids),
                Arc::new(doc_titles),
                Arc::new(contents),
                Arc::new(content_hashes),
                Arc::new(created_ats),
                Arc::new(embedding_list),
            ],
        )
        .map_err(|e| SearchError::Database(format!("Failed to create record batch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::embeddings::HashingEmbedder;

    #[test]
    fn test_record_batch_matches_schema() {
        let embedder = HashingEmbedder::new(8);
        let chunks = vec![
            DocumentChunk::new("d1".into(), "규정".into(), "연차 휴가".into()),
            DocumentChunk::new("d1".into(), "규정".into(), "병가".into()),
        ];
        let embeddings: Vec<Vec<f32>> = chunks.iter().map(|c| embedder.embed_text(&c.content)).collect();

        let schema = SchemaManager::get_chunks_schema(8);
        let batch =
            ChunkInserter::create_record_batch(schema.clone(), &chunks, &embeddings, 8).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema(), schema);
    }

    #[tokio::test]
    async fn test_insert_and_search_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::DatabaseConfig {
            uri: dir.path().join("lancedb").to_string_lossy().to_string(),
            table_name: "chunks".to_string(),
            batch_size: 8,
            embedding_dim: 32,
            retry_attempts: 1,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 1,
        };
        let client = LanceDbClient::new(config).await.unwrap();
        assert!(client.vector_search(vec![0.0; 32], 3).await.unwrap().is_empty());

        let embedder = Arc::new(HashingEmbedder::new(32));
        let inserter = ChunkInserter::new(&client, embedder.clone());
        let chunks = vec![
            DocumentChunk::new("d1".into(), "취업 규칙".into(), "연차 휴가 규정".into()),
            DocumentChunk::new("d2".into(), "보고서".into(), "분기 매출 분석".into()),
        ];
        assert_eq!(inserter.insert_batch(&chunks).await.unwrap(), 2);
        assert_eq!(client.chunk_count().await.unwrap(), 2);

        let hits = client
            .vector_search(embedder.embed_text("연차 휴가 규정"), 2)
            .await
            .unwrap();
        assert_eq!(hits[0].doc_id, "d1");
        assert!(hits[0].similarity_score >= hits[1].similarity_score);

        client.delete_by_doc_id("d1").await.unwrap();
        assert_eq!(client.chunk_count().await.unwrap(), 1);
    }
}
