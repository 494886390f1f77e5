// file: src/pipeline/mod.rs
// description: chunk ingestion pipeline exports
// reference: pipeline orchestration

mod ingest;
mod progress;

pub use ingest::{ChunkIngestor, LoadedChunks, read_chunks_jsonl};
pub use progress::{IngestProgress, IngestStats};
