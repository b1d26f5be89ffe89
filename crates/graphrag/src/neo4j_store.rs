//! Neo4j-backed [`GraphStore`] over the HTTP transactional Cypher API.
//!
//! Every operation is a single `POST {url}/db/{database}/tx/commit` with
//! one or more statements, so each write commits or rolls back as a unit.
//! Semantic search uses the Graph Data Science `gds.similarity.cosine`
//! function when the server has it; otherwise the call fails and
//! retrieval falls back to ranking fetched embeddings in-process.
//!
//! Labels and relationship types cannot be query parameters in Cypher.
//! Only [`EntityLabel::as_str`] values and [`relationship_type`] output are
//! ever interpolated into statement text.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use graphrag_core::error::{RagError, Result};
use graphrag_core::graph::{
    relationship_type, validate_embedded_chunks, EntityLabel, ExtractedGraph,
};
use graphrag_core::models::{Document, EmbeddedChunk, ScoredCandidate};
use graphrag_core::store::GraphStore;

use crate::config::Neo4jConfig;
use crate::embedding::to_f32_vec;

const SERVICE: &str = "neo4j";

// Both queries order ties by id so the native and fallback paths agree.
const FETCH_ALL_CHUNKS: &str = "MATCH (c:Chunk) WHERE c.embedding IS NOT NULL \
     RETURN c.id AS id, c.content AS content, c.embedding AS embedding \
     ORDER BY c.id";

const NATIVE_SEARCH: &str = "MATCH (c:Chunk) WHERE c.embedding IS NOT NULL \
     WITH c, gds.similarity.cosine(c.embedding, $queryEmbedding) AS similarity \
     RETURN c.id AS id, c.content AS content, similarity \
     ORDER BY similarity DESC, c.id LIMIT $limit";

#[derive(Debug, Clone, Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
}

impl Statement {
    fn new(statement: impl Into<String>, parameters: Value) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub struct Neo4jStore {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: Option<String>,
}

impl Neo4jStore {
    /// Build a store from config. The password comes from `NEO4J_PASSWORD`.
    pub fn new(config: &Neo4jConfig) -> AnyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Neo4j HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            user: config.user.clone(),
            password: std::env::var("NEO4J_PASSWORD").ok(),
        })
    }

    async fn run(&self, statements: Vec<Statement>) -> Result<Vec<StatementResult>> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, self.password.as_deref())
            .json(&json!({ "statements": statements }))
            .send()
            .await
            .map_err(|e| RagError::external(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::external(
                SERVICE,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let body: TxResponse = response
            .json()
            .await
            .map_err(|e| RagError::external(SERVICE, e))?;

        if let Some(err) = body.errors.first() {
            return Err(RagError::external(
                SERVICE,
                format!("{}: {}", err.code, err.message),
            ));
        }
        Ok(body.results)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    fn backend_name(&self) -> &str {
        SERVICE
    }

    async fn write_document(&self, document: &Document) -> Result<()> {
        let statement = Statement::new(
            "MERGE (d:Document {id: $id}) \
             SET d.title = $title, d.contentType = $contentType, d.metadata = $metadata",
            json!({
                "id": document.id,
                "title": document.title,
                "contentType": document.content_type,
                "metadata": Value::Object(document.metadata.clone()).to_string(),
            }),
        );
        self.run(vec![statement]).await.map(|_| ())
    }

    async fn write_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        validate_embedded_chunks(chunks)?;
        self.run(vec![chunk_statement(chunks)]).await.map(|_| ())
    }

    async fn fetch_all_chunks_with_embeddings(&self) -> Result<Vec<EmbeddedChunk>> {
        let statement = Statement::new(FETCH_ALL_CHUNKS, json!({}));
        let results = self.run(vec![statement]).await?;
        parse_chunk_rows(&results)
    }

    async fn native_vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<ScoredCandidate>>> {
        let statement = Statement::new(
            NATIVE_SEARCH,
            json!({ "queryEmbedding": query, "limit": limit }),
        );
        let results = self.run(vec![statement]).await?;
        parse_scored_rows(&results).map(Some)
    }

    async fn store_graph(&self, graph: &ExtractedGraph) -> Result<()> {
        let statements = graph_statements(graph)?;
        if statements.is_empty() {
            return Ok(());
        }
        self.run(statements).await.map(|_| ())
    }
}

fn chunk_statement(chunks: &[EmbeddedChunk]) -> Statement {
    let rows: Vec<Value> = chunks
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "content": c.content,
                "embedding": c.embedding,
                "documentId": c.metadata.get("document_id").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();

    Statement::new(
        "UNWIND $chunks AS chunk \
         MERGE (c:Chunk {id: chunk.id}) \
         SET c.content = chunk.content, c.embedding = chunk.embedding, c.documentId = chunk.documentId \
         WITH c, chunk \
         OPTIONAL MATCH (d:Document {id: chunk.documentId}) \
         FOREACH (_ IN CASE WHEN d IS NULL THEN [] ELSE [1] END | MERGE (d)-[:HAS_CHUNK]->(c))",
        json!({ "chunks": rows }),
    )
}

/// One statement per label and one per relationship type, all sent in a
/// single transaction.
fn graph_statements(graph: &ExtractedGraph) -> Result<Vec<Statement>> {
    let mut nodes_by_label: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
    for node in &graph.nodes {
        nodes_by_label
            .entry(node.label().as_str())
            .or_default()
            .push(json!({
                "id": node.id,
                "name": node.name,
                "description": node.description,
                "properties": Value::Object(node.properties.clone()).to_string(),
            }));
    }

    let mut rels_by_type: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for rel in &graph.relationships {
        rels_by_type
            .entry(relationship_type(&rel.relationship_type)?)
            .or_default()
            .push(json!({
                "id": rel.id,
                "source": rel.source,
                "target": rel.target,
                "description": rel.description,
                "properties": Value::Object(rel.properties.clone()).to_string(),
            }));
    }

    let mut statements = Vec::new();
    for (label, nodes) in nodes_by_label {
        statements.push(Statement::new(
            format!(
                "UNWIND $nodes AS node \
                 MERGE (n:{entity} {{id: node.id}}) \
                 SET n:{label}, n.name = node.name, n.description = node.description, n.properties = node.properties",
                entity = EntityLabel::Entity.as_str(),
                label = label
            ),
            json!({ "nodes": nodes }),
        ));
    }
    for (rel_type, rels) in rels_by_type {
        statements.push(Statement::new(
            format!(
                "UNWIND $rels AS rel \
                 MATCH (s:{entity} {{id: rel.source}}) \
                 MATCH (t:{entity} {{id: rel.target}}) \
                 MERGE (s)-[r:{rel_type} {{id: rel.id}}]->(t) \
                 SET r.description = rel.description, r.properties = rel.properties, r.createdAt = datetime()",
                entity = EntityLabel::Entity.as_str(),
                rel_type = rel_type
            ),
            json!({ "rels": rels }),
        ));
    }
    Ok(statements)
}

fn rows(results: &[StatementResult]) -> impl Iterator<Item = &Vec<Value>> {
    results.iter().flat_map(|r| r.data.iter().map(|d| &d.row))
}

fn row_str(row: &[Value], i: usize) -> Result<String> {
    row.get(i)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RagError::external(SERVICE, format!("column {} is not a string", i)))
}

fn parse_chunk_rows(results: &[StatementResult]) -> Result<Vec<EmbeddedChunk>> {
    rows(results)
        .map(|row| {
            let values = row
                .get(2)
                .and_then(Value::as_array)
                .ok_or_else(|| RagError::external(SERVICE, "embedding is not a list"))?;
            let embedding = to_f32_vec(SERVICE, values)?;
            Ok(EmbeddedChunk::new(row_str(row, 0)?, row_str(row, 1)?, embedding))
        })
        .collect()
}

fn parse_scored_rows(results: &[StatementResult]) -> Result<Vec<ScoredCandidate>> {
    rows(results)
        .map(|row| {
            let similarity = row
                .get(2)
                .and_then(Value::as_f64)
                .ok_or_else(|| RagError::external(SERVICE, "similarity is not a number"))?;
            Ok(ScoredCandidate::new(
                row_str(row, 0)?,
                row_str(row, 1)?,
                similarity,
            ))
        })
        .collect()
}
