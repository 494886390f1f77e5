// file: src/search/semantic.rs
// description: semantic search: query embedding + LanceDB nearest neighbours

use crate::database::client::LanceDbClient;
use crate::database::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::models::TextSearchResult;
use crate::search::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Up to `top_k` chunks, most similar first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<TextSearchResult>>;

    async fn ping(&self) -> Result<()>;
}

pub struct VectorSearch {
    client: LanceDbClient,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl VectorSearch {
    pub fn new(client: LanceDbClient, embedder: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        info!(
            "Semantic search on table {} with {} embeddings",
            client.table_name(),
            embedder.name()
        );
        Self {
            client,
            embedder,
            retry,
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedding = self
            .retry
            .run("query embedding", || self.embedder.embed_one(query))
            .await
            .map_err(|e| match e {
                SearchError::EmbeddingUnavailable(_) => e,
                other => SearchError::EmbeddingUnavailable(other.to_string()),
            })?;

        let expected = self.client.embedding_dim();
        if embedding.len() != expected {
            return Err(SearchError::EmbeddingUnavailable(format!(
                "{} returned dimension {}, index expects {}",
                self.embedder.name(),
                embedding.len(),
                expected
            )));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl SemanticSearch for VectorSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<TextSearchResult>> {
        let embedding = self.embed_query(query).await?;

        let mut results = self
            .retry
            .run("vector search", || self.client.vector_search(embedding.clone(), top_k))
            .await
            .map_err(|e| match e {
                SearchError::IndexUnavailable(_) => e,
                other => SearchError::IndexUnavailable(other.to_string()),
            })?;

        results.truncate(top_k);
        debug!("Semantic search returned {} chunks", results.len());
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::embeddings::HashingEmbedder;
    use crate::database::insert::ChunkInserter;
    use crate::models::DocumentChunk;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn db_config(dir: &std::path::Path, dim: usize) -> DatabaseConfig {
        DatabaseConfig {
            uri: dir.join("lancedb").to_string_lossy().to_string(),
            table_name: "document_chunks".to_string(),
            batch_size: 8,
            embedding_dim: dim,
            retry_attempts: 3,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 2,
        }
    }

    struct FlakyEmbedder {
        failures: u32,
        calls: AtomicU32,
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(SearchError::EmbeddingUnavailable("429 rate limited".to_string()));
            }
            self.inner.embed(texts).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_search_ranks_related_chunk_first() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanceDbClient::new(db_config(dir.path(), 64)).await.unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(64));

        ChunkInserter::new(&client, embedder.clone())
            .insert_batch(&[
                DocumentChunk::new("rules".into(), "취업 규칙".into(), "연차 휴가 규정 안내".into()),
                DocumentChunk::new("report".into(), "분기 보고서".into(), "quarterly revenue outlook".into()),
            ])
            .await
            .unwrap();

        let search = VectorSearch::new(client, embedder, fast_retry());
        let results = search.search("휴가 규정", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, "rules");
        assert!(results[0].similarity_score >= results[1].similarity_score);
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.similarity_score)));
        search.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanceDbClient::new(db_config(dir.path(), 16)).await.unwrap();
        let search = VectorSearch::new(client, Arc::new(HashingEmbedder::new(16)), fast_retry());
        assert!(search.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_retries_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanceDbClient::new(db_config(dir.path(), 16)).await.unwrap();
        let embedder = Arc::new(FlakyEmbedder {
            failures: 2,
            calls: AtomicU32::new(0),
            inner: HashingEmbedder::new(16),
        });
        let search = VectorSearch::new(client, embedder.clone(), fast_retry());
        assert!(search.search("q", 3).await.is_ok());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_embedding_exhaustion_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanceDbClient::new(db_config(dir.path(), 16)).await.unwrap();
        let embedder = Arc::new(FlakyEmbedder {
            failures: 10,
            calls: AtomicU32::new(0),
            inner: HashingEmbedder::new(16),
        });
        let search = VectorSearch::new(client, embedder, fast_retry());
        assert!(matches!(
            search.search("q", 3).await,
            Err(SearchError::EmbeddingUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = LanceDbClient::new(db_config(dir.path(), 16)).await.unwrap();
        let search = VectorSearch::new(client, Arc::new(HashingEmbedder::new(8)), fast_retry());
        assert!(matches!(
            search.search("q", 3).await,
            Err(SearchError::EmbeddingUnavailable(_))
        ));
    }
}
