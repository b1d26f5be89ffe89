//! In-memory [`GraphStore`] implementation for tests and embedding in
//! other programs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! By default it has no native vector operator, so retrieval always takes
//! the fallback path; [`InMemoryStore::with_native_search`] turns on a
//! brute-force "native" search for exercising the preferred path.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::graph::{
    relationship_type, validate_embedded_chunks, EntityLabel, ExtractedGraph, GraphEntity,
};
use crate::models::{EmbeddedChunk, ScoredCandidate};
use crate::similarity::rank_and_limit;

use super::GraphStore;

/// A node as written: the extracted entity plus its allow-listed label.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub label: EntityLabel,
    pub entity: GraphEntity,
}

/// An edge as written, with its sanitised type.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRelationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub description: String,
}

/// In-memory store.
pub struct InMemoryStore {
    chunks: RwLock<Vec<EmbeddedChunk>>,
    entities: RwLock<HashMap<String, StoredEntity>>,
    relationships: RwLock<Vec<StoredRelationship>>,
    native_search: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            entities: RwLock::new(HashMap::new()),
            relationships: RwLock::new(Vec::new()),
            native_search: false,
        }
    }

    /// Report a native vector operator and answer it by brute force.
    pub fn with_native_search(mut self) -> Self {
        self.native_search = true;
        self
    }

    pub fn chunk_count(&self) -> usize {
        self.read(&self.chunks).map(|c| c.len()).unwrap_or(0)
    }

    pub fn entity(&self, id: &str) -> Option<StoredEntity> {
        self.read(&self.entities).ok()?.get(id).cloned()
    }

    pub fn relationships(&self) -> Vec<StoredRelationship> {
        self.read(&self.relationships)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> Result<RwLockReadGuard<'a, T>> {
        lock.read()
            .map_err(|_| RagError::external(self.backend_name(), "lock poisoned"))
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> Result<RwLockWriteGuard<'a, T>> {
        lock.write()
            .map_err(|_| RagError::external(self.backend_name(), "lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn write_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        validate_embedded_chunks(chunks)?;
        let mut stored = self.write(&self.chunks)?;
        for chunk in chunks {
            match stored.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk.clone(),
                None => stored.push(chunk.clone()),
            }
        }
        Ok(())
    }

    async fn fetch_all_chunks_with_embeddings(&self) -> Result<Vec<EmbeddedChunk>> {
        Ok(self.read(&self.chunks)?.clone())
    }

    async fn native_vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<ScoredCandidate>>> {
        if !self.native_search {
            return Ok(None);
        }
        let stored = self.read(&self.chunks)?;
        rank_and_limit(query, &stored, limit).map(Some)
    }

    async fn store_graph(&self, graph: &ExtractedGraph) -> Result<()> {
        // Sanitise everything before touching state so a bad record writes nothing.
        let mut rels = Vec::with_capacity(graph.relationships.len());
        for rel in &graph.relationships {
            rels.push(StoredRelationship {
                id: rel.id.clone(),
                source: rel.source.clone(),
                target: rel.target.clone(),
                rel_type: relationship_type(&rel.relationship_type)?,
                description: rel.description.clone(),
            });
        }

        let mut entities = self.write(&self.entities)?;
        for node in &graph.nodes {
            entities.insert(
                node.id.clone(),
                StoredEntity {
                    label: node.label(),
                    entity: node.clone(),
                },
            );
        }

        let mut stored_rels = self.write(&self.relationships)?;
        for rel in rels {
            if !entities.contains_key(&rel.source) || !entities.contains_key(&rel.target) {
                tracing::debug!(id = %rel.id, "skipping relationship with unknown endpoint");
                continue;
            }
            stored_rels.retain(|r| r.id != rel.id);
            stored_rels.push(rel);
        }
        Ok(())
    }
}
