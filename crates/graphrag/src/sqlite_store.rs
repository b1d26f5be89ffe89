//! SQLite-backed [`GraphStore`] implementation.
//!
//! Chunks live in the `chunks` table with their embedding as a
//! little-endian f32 BLOB; entities and relationships get a table each.
//! SQLite has no vector operator, so this store keeps the default
//! [`GraphStore::native_vector_search`] and retrieval always ranks
//! in-process.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use graphrag_core::embedding::{blob_to_vec, vec_to_blob};
use graphrag_core::error::{RagError, Result};
use graphrag_core::graph::{relationship_type, validate_embedded_chunks, ExtractedGraph};
use graphrag_core::models::{Document, EmbeddedChunk};
use graphrag_core::store::GraphStore;

/// SQLite implementation of the [`GraphStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RagError {
    RagError::external("sqlite", e)
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RagError::external("sqlite", e))
}

#[async_trait]
impl GraphStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn write_document(&self, doc: &Document) -> Result<()> {
        let content_hash = doc
            .metadata
            .get("content_hash")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content_type, body, metadata_json, content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content_type = excluded.content_type,
                body = excluded.body,
                metadata_json = excluded.metadata_json,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content_type)
        .bind(&doc.content)
        .bind(to_json(&doc.metadata)?)
        .bind(content_hash)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn write_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        validate_embedded_chunks(chunks)?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for chunk in chunks {
            let document_id = chunk
                .metadata
                .get("document_id")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, content, embedding, dims, metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    document_id = excluded.document_id,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    metadata_json = excluded.metadata_json
                "#,
            )
            .bind(&chunk.id)
            .bind(document_id)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(to_json(&chunk.metadata)?)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn fetch_all_chunks_with_embeddings(&self) -> Result<Vec<EmbeddedChunk>> {
        let rows = sqlx::query(
            "SELECT id, content, embedding, metadata_json FROM chunks ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                    RagError::external("sqlite", format!("chunk {} has corrupt metadata: {}", id, e))
                })?;
                Ok(EmbeddedChunk {
                    id,
                    content: row.get("content"),
                    embedding: blob_to_vec(&blob),
                    metadata,
                })
            })
            .collect()
    }

    async fn store_graph(&self, graph: &ExtractedGraph) -> Result<()> {
        let mut rel_types = Vec::with_capacity(graph.relationships.len());
        for rel in &graph.relationships {
            rel_types.push(relationship_type(&rel.relationship_type)?);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for node in &graph.nodes {
            sqlx::query(
                r#"
                INSERT INTO entities (id, label, name, description, properties_json)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    label = excluded.label,
                    name = excluded.name,
                    description = excluded.description,
                    properties_json = excluded.properties_json
                "#,
            )
            .bind(&node.id)
            .bind(node.label().as_str())
            .bind(&node.name)
            .bind(&node.description)
            .bind(to_json(&node.properties)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let now = chrono::Utc::now().timestamp();
        for (rel, rel_type) in graph.relationships.iter().zip(rel_types) {
            let endpoints_known: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?) AND EXISTS(SELECT 1 FROM entities WHERE id = ?)",
            )
            .bind(&rel.source)
            .bind(&rel.target)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            if !endpoints_known {
                tracing::debug!(id = %rel.id, "skipping relationship with unknown endpoint");
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO relationships (id, source_id, target_id, rel_type, description, properties_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_id = excluded.source_id,
                    target_id = excluded.target_id,
                    rel_type = excluded.rel_type,
                    description = excluded.description,
                    properties_json = excluded.properties_json
                "#,
            )
            .bind(&rel.id)
            .bind(&rel.source)
            .bind(&rel.target)
            .bind(rel_type)
            .bind(&rel.description)
            .bind(to_json(&rel.properties)?)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
