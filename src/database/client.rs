// file: src/database/client.rs
// description: LanceDB client wrapper for the chunk vector index
// reference: https://docs.rs/lancedb

use crate::config::DatabaseConfig;
use crate::error::{Result, SearchError};
use crate::models::TextSearchResult;
use arrow_array::{Array, Float32Array, RecordBatch, StringArray, UInt64Array};
use chrono::DateTime;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table, connect};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LanceDbClient {
    connection: Connection,
    config: DatabaseConfig,
}

impl LanceDbClient {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("Connecting to LanceDB at {}", config.uri);

        let connection = connect(&config.uri).execute().await.map_err(|e| {
            SearchError::IndexUnavailable(format!("Failed to connect to LanceDB: {}", e))
        })?;

        Ok(Self { connection, config })
    }

    pub fn get_connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn ping(&self) -> Result<()> {
        debug!("Checking LanceDB connection");

        // Listing tables is the cheapest round trip available.
        self.connection
            .table_names()
            .execute()
            .await
            .map(|_| ())
            .map_err(|e| SearchError::IndexUnavailable(format!("LanceDB connection failed: {}", e)))
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SearchError::IndexUnavailable(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == table_name))
    }

    pub async fn get_table(&self, table_name: &str) -> Result<Table> {
        self.connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| {
                SearchError::IndexUnavailable(format!("Failed to open table {}: {}", table_name, e))
            })
    }

    pub async fn chunk_count(&self) -> Result<u64> {
        if !self.table_exists(&self.config.table_name).await? {
            return Ok(0);
        }

        let table = self.get_table(&self.config.table_name).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| SearchError::IndexUnavailable(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Removes every chunk of a document so it can be re-ingested.
    pub async fn delete_by_doc_id(&self, doc_id: &str) -> Result<()> {
        if !self.table_exists(&self.config.table_name).await? {
            return Ok(());
        }

        let table = self.get_table(&self.config.table_name).await?;
        let predicate = format!("doc_id = '{}'", doc_id.replace('\'', "''"));

        debug!("Deleting chunks with predicate: {}", predicate);

        table.delete(&predicate).await.map_err(|e| {
            SearchError::Database(format!("Failed to delete chunks for {}: {}", doc_id, e))
        })?;

        Ok(())
    }

    /// Nearest chunks to `query_embedding`, most similar first. A missing
    /// table is an empty corpus, not an error.
    pub async fn vector_search(
        &self,
        query_embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<TextSearchResult>> {
        if !self.table_exists(&self.config.table_name).await? {
            warn!("Table does not exist, returning empty results");
            return Ok(Vec::new());
        }

        let table = self.get_table(&self.config.table_name).await?;

        debug!("Performing vector search with limit {}", limit);

        let mut results_stream = table
            .vector_search(query_embedding)
            .map_err(|e| {
                SearchError::IndexUnavailable(format!("Failed to create vector search: {}", e))
            })?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| SearchError::IndexUnavailable(format!("Vector search failed: {}", e)))?;

        let mut search_results = Vec::new();

        while let Some(batch_result) = results_stream.next().await {
            let batch = batch_result.map_err(|e| {
                SearchError::IndexUnavailable(format!("Failed to read result batch: {}", e))
            })?;
            search_results.extend(Self::batch_to_results(&batch)?);
        }

        search_results.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("Vector search returned {} results", search_results.len());
        Ok(search_results)
    }

    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<TextSearchResult>> {
        let ids = string_column(batch, "id")?;
        let doc_ids = string_column(batch, "doc_id")?;
        let doc_titles = string_column(batch, "doc_title")?;
        let contents = string_column(batch, "content")?;

        let created_ats = batch
            .column_by_name("created_at")
            .and_then(|col| col.as_any().downcast_ref::<UInt64Array>());

        // LanceDB returns the distance in a special column
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut results = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let created_at = created_ats
                .filter(|col| !col.is_null(i))
                .and_then(|col| DateTime::from_timestamp_millis(col.value(i) as i64));

            results.push(TextSearchResult {
                id: ids.value(i).to_string(),
                doc_id: doc_ids.value(i).to_string(),
                doc_title: doc_titles.value(i).to_string(),
                content: contents.value(i).to_string(),
                created_at,
                similarity_score: distances
                    .map(|d| distance_to_similarity(d.value(i)))
                    .unwrap_or(1.0),
                source: TextSearchResult::SOURCE.to_string(),
            });
        }

        Ok(results)
    }
}

/// Lower distance means more similar; maps [0, inf) onto (0, 1].
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance.is_nan() || distance < 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + distance)
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SearchError::IndexUnavailable(format!("Missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| SearchError::IndexUnavailable(format!("Invalid '{}' column type", name)))
}
