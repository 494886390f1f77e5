// file: src/database/mod.rs
// description: storage backends for the vector index and structured records
// reference: internal module structure

pub mod client;
pub mod embeddings;
pub mod insert;
pub mod schema;
pub mod sqlite;

pub use client::LanceDbClient;
pub use embeddings::{EmbeddingProvider, GroqEmbeddingClient, HashingEmbedder, provider_from_config};
pub use insert::ChunkInserter;
pub use schema::SchemaManager;
pub use sqlite::{InterruptGuard, SqliteClient, TableSchema};
