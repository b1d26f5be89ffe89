//! Storage abstraction for GraphRAG.
//!
//! The [`GraphStore`] trait defines every storage operation the retrieval
//! and ingestion pipeline needs, so backends (SQLite, Neo4j, in-memory)
//! are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::ExtractedGraph;
use crate::models::{Document, EmbeddedChunk, ScoredCandidate};

/// Abstract storage backend for chunks, embeddings and the extracted graph.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`write_document`](GraphStore::write_document) | Record the source document (optional) |
/// | [`write_chunks`](GraphStore::write_chunks) | Persist `(id, content, vector)` records |
/// | [`fetch_all_chunks_with_embeddings`](GraphStore::fetch_all_chunks_with_embeddings) | Read every record back, for in-process ranking |
/// | [`native_vector_search`](GraphStore::native_vector_search) | Backend-side similarity search, if the backend has one |
/// | [`store_graph`](GraphStore::store_graph) | Persist extracted entities and relationships |
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend identifier used in logs and error messages.
    fn backend_name(&self) -> &str;

    /// Record the document chunks are about to be written for.
    ///
    /// Backends without a document table keep the default no-op.
    async fn write_document(&self, _document: &Document) -> Result<()> {
        Ok(())
    }

    /// Insert or replace chunks by id. All records are written or none are.
    async fn write_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Every stored chunk that has an embedding.
    async fn fetch_all_chunks_with_embeddings(&self) -> Result<Vec<EmbeddedChunk>>;

    /// Rank stored chunks against `query` using the backend's own operator.
    ///
    /// `Ok(None)` means the backend has no such operator; callers then
    /// fall back to [`fetch_all_chunks_with_embeddings`](GraphStore::fetch_all_chunks_with_embeddings)
    /// and rank in-process.
    async fn native_vector_search(
        &self,
        _query: &[f32],
        _limit: usize,
    ) -> Result<Option<Vec<ScoredCandidate>>> {
        Ok(None)
    }

    /// Persist an extracted graph in one unit of work.
    ///
    /// Node labels come from [`EntityLabel`](crate::graph::EntityLabel) and
    /// relationship types from [`relationship_type`](crate::graph::relationship_type);
    /// relationships whose endpoints are unknown are skipped.
    async fn store_graph(&self, graph: &ExtractedGraph) -> Result<()>;
}
