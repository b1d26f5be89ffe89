//! Builds the shared [`RagEngine`] from configuration.
//!
//! Providers and the store are created once here and handed to the
//! engine as trait objects; the CLI and the HTTP server both go through
//! [`build_engine`].

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use graphrag_core::store::GraphStore;
use graphrag_core::RagEngine;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_chat_provider;
use crate::migrate::apply_schema;
use crate::neo4j_store::Neo4jStore;
use crate::sqlite_store::SqliteStore;

/// Open the configured graph backend. SQLite schemas are applied on open.
pub async fn open_store(config: &Config) -> Result<Arc<dyn GraphStore>> {
    match config.graph.backend.as_str() {
        "sqlite" => {
            let pool = db::connect(config).await?;
            apply_schema(&pool).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        "neo4j" => Ok(Arc::new(Neo4jStore::new(&config.graph.neo4j)?)),
        other => bail!("Unknown graph backend: {}", other),
    }
}

pub async fn build_engine(config: &Config) -> Result<RagEngine> {
    let store = open_store(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let chat = create_chat_provider(&config.llm)?;

    info!(
        backend = store.backend_name(),
        embedding = embedder.model_name(),
        llm = chat.model_name(),
        "engine ready"
    );

    Ok(RagEngine::new(embedder, store, chat)
        .with_chunking(config.chunking.chunk_size, config.chunking.overlap))
}
