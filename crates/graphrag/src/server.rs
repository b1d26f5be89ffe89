//! HTTP server for ingestion and querying.
//!
//! Every pipeline stage is exposed as its own endpoint so callers can run
//! the stages one at a time, plus one endpoint that runs them all.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name, version and endpoint list |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ingest/extract-text` | File path → document |
//! | `POST` | `/ingest/break-text` | Text → chunks |
//! | `POST` | `/ingest/embed-chunks` | Chunks → embedded chunks |
//! | `POST` | `/ingest/store-chunks` | Embedded chunks → store |
//! | `POST` | `/ingest/extract-graph` | Chunks → entities and relationships |
//! | `POST` | `/ingest/store-graph` | Entities and relationships → store |
//! | `POST` | `/ingest/process-document` | File path → full pipeline |
//! | `POST` | `/query/semantic` | Query → ranked chunks |
//! | `POST` | `/query/rag` | Query → answer with citations |
//!
//! Successful responses wrap their payload as `{"data": …}`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query string is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `parse_failure` (502),
//! `upstream_error` (502), `retrieval_failed` (503), `internal` (500).
//!
//! # File access
//!
//! The two endpoints that take a `file_path` only read files under
//! `[ingest].root`. Relative paths are resolved against it and anything
//! that escapes it, through `..` or a symlink, is a `bad_request`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use graphrag_core::chunk::chunk_text;
use graphrag_core::graph::ExtractedGraph;
use graphrag_core::models::{Document, EmbeddedChunk, TextChunk};
use graphrag_core::{IngestOptions, IngestReport, RagAnswer, RagEngine, RagError, SearchResponse};

use crate::config::{Config, RetrievalConfig};
use crate::engine::build_engine;
use crate::extract::{confine_to_root, parse_document, DocumentType, ExtractError};

#[derive(Clone)]
struct AppState {
    engine: Arc<RagEngine>,
    retrieval: Arc<RetrievalConfig>,
    ingest_root: Arc<PathBuf>,
}

/// Build the engine from `config` and serve on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ingest_root = resolve_ingest_root(&config.ingest.root)?;
    let engine = Arc::new(build_engine(config).await?);
    run_server_with_engine(
        &config.server.bind,
        engine,
        config.retrieval.clone(),
        ingest_root,
    )
    .await
}

/// Create `root` if needed and return its canonical form.
pub fn resolve_ingest_root(root: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create ingest root: {}", root.display()))?;
    root.canonicalize()
        .with_context(|| format!("Failed to resolve ingest root: {}", root.display()))
}

/// Serve an already-built engine. Runs until the process is terminated.
pub async fn run_server_with_engine(
    bind_addr: &str,
    engine: Arc<RagEngine>,
    retrieval: RetrievalConfig,
    ingest_root: PathBuf,
) -> anyhow::Result<()> {
    info!(root = %ingest_root.display(), "ingest root");
    let app = router(engine, retrieval, ingest_root);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("GraphRAG server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// `ingest_root` must be canonical; see [`resolve_ingest_root`].
pub fn router(engine: Arc<RagEngine>, retrieval: RetrievalConfig, ingest_root: PathBuf) -> Router {
    let state = AppState {
        engine,
        retrieval: Arc::new(retrieval),
        ingest_root: Arc::new(ingest_root),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/ingest/extract-text", post(handle_extract_text))
        .route("/ingest/break-text", post(handle_break_text))
        .route("/ingest/embed-chunks", post(handle_embed_chunks))
        .route("/ingest/store-chunks", post(handle_store_chunks))
        .route("/ingest/extract-graph", post(handle_extract_graph))
        .route("/ingest/store-graph", post(handle_store_graph))
        .route("/ingest/process-document", post(handle_process_document))
        .route("/query/semantic", post(handle_semantic))
        .route("/query/rag", post(handle_rag))
        .layer(cors)
        .with_state(state)
}

// ============ Response envelopes ============

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
}

fn data<T: Serialize>(value: T) -> Json<DataBody<T>> {
    Json(DataBody { data: value })
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Parse(_) => (StatusCode::BAD_GATEWAY, "parse_failure"),
            RagError::ExternalDependency { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            RagError::ExhaustedFallback { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "retrieval_failed")
            }
        };
        if status.is_server_error() {
            warn!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        bad_request(err.to_string())
    }
}

/// Unwrap a JSON body, turning axum's rejection into the error contract.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

async fn extract_document(
    root: Arc<PathBuf>,
    file_path: PathBuf,
    doc_type: Option<DocumentType>,
) -> Result<Document, AppError> {
    let document = tokio::task::spawn_blocking(move || -> Result<Document, ExtractError> {
        let path = confine_to_root(&root, &file_path).map_err(|e| {
            if matches!(e, ExtractError::OutsideRoot(_)) {
                warn!(path = %file_path.display(), "rejected file outside ingest root");
            }
            e
        })?;
        parse_document(&path, doc_type)
    })
    .await
    .map_err(|e| internal(format!("extraction task failed: {}", e)))??;
    Ok(document)
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct IndexResponse {
    name: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "graphrag",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /health",
            "POST /ingest/extract-text",
            "POST /ingest/break-text",
            "POST /ingest/embed-chunks",
            "POST /ingest/store-chunks",
            "POST /ingest/extract-graph",
            "POST /ingest/store-graph",
            "POST /ingest/process-document",
            "POST /query/semantic",
            "POST /query/rag",
        ],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /ingest ============

#[derive(Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    file_path: PathBuf,
    #[serde(default, rename = "type")]
    doc_type: Option<DocumentType>,
}

async fn handle_extract_text(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    let document = extract_document(state.ingest_root, req.file_path, req.doc_type).await?;
    Ok(data(document))
}

#[derive(Deserialize)]
struct BreakTextRequest {
    #[serde(default)]
    text: String,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
}

async fn handle_break_text(
    State(state): State<AppState>,
    payload: Result<Json<BreakTextRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    if req.text.trim().is_empty() {
        return Err(bad_request("text is required"));
    }
    if req.chunk_size == Some(0) {
        return Err(bad_request("chunk_size must be > 0"));
    }

    let (default_size, default_overlap) = state.engine.chunk_settings();
    let chunks = chunk_text(
        &req.text,
        req.chunk_size.unwrap_or(default_size),
        req.overlap.unwrap_or(default_overlap),
    );
    Ok(data(chunks))
}

#[derive(Deserialize)]
struct TextChunksRequest {
    #[serde(default)]
    chunks: Vec<TextChunk>,
}

#[derive(Serialize)]
struct EmbedChunksResponse {
    chunks_length: usize,
    chunks: Vec<EmbeddedChunk>,
}

async fn handle_embed_chunks(
    State(state): State<AppState>,
    payload: Result<Json<TextChunksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    let chunks = state.engine.embed_chunks(&req.chunks).await?;
    Ok(data(EmbedChunksResponse {
        chunks_length: chunks.len(),
        chunks,
    }))
}

#[derive(Deserialize)]
struct EmbeddedChunksRequest {
    #[serde(default)]
    chunks: Vec<EmbeddedChunk>,
}

#[derive(Serialize)]
struct StoreChunksResponse {
    stored: usize,
}

async fn handle_store_chunks(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddedChunksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    if req.chunks.is_empty() {
        return Err(bad_request("chunks array required"));
    }
    state.engine.store_chunks(&req.chunks).await?;
    Ok(data(StoreChunksResponse {
        stored: req.chunks.len(),
    }))
}

async fn handle_extract_graph(
    State(state): State<AppState>,
    payload: Result<Json<TextChunksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    let graph = state.engine.extract_graph(&req.chunks).await?;
    Ok(data(graph))
}

#[derive(Serialize)]
struct StoreGraphResponse {
    nodes: usize,
    relationships: usize,
}

async fn handle_store_graph(
    State(state): State<AppState>,
    payload: Result<Json<ExtractedGraph>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let graph = body(payload)?;
    state.engine.store_graph(&graph).await?;
    Ok(data(StoreGraphResponse {
        nodes: graph.nodes.len(),
        relationships: graph.relationships.len(),
    }))
}

#[derive(Deserialize)]
struct ProcessDocumentRequest {
    #[serde(default)]
    file_path: PathBuf,
    #[serde(default, rename = "type")]
    doc_type: Option<DocumentType>,
    #[serde(default)]
    skip_graph: bool,
}

#[derive(Serialize)]
struct ProcessDocumentResponse {
    document: Document,
    ingest: IngestReport,
}

async fn handle_process_document(
    State(state): State<AppState>,
    payload: Result<Json<ProcessDocumentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    let document =
        extract_document(state.ingest_root.clone(), req.file_path, req.doc_type).await?;
    let report = state
        .engine
        .ingest(
            &document,
            IngestOptions {
                extract_graph: !req.skip_graph,
            },
        )
        .await?;
    Ok(data(ProcessDocumentResponse {
        document,
        ingest: report,
    }))
}

// ============ /query ============

#[derive(Deserialize)]
struct SemanticRequest {
    #[serde(default)]
    query: String,
    limit: Option<usize>,
}

async fn handle_semantic(
    State(state): State<AppState>,
    payload: Result<Json<SemanticRequest>, JsonRejection>,
) -> Result<Json<DataBody<SearchResponse>>, AppError> {
    let req = body(payload)?;
    let limit = req.limit.unwrap_or(state.retrieval.search_limit);
    let response = state.engine.semantic_search(&req.query, limit).await?;
    Ok(data(response))
}

#[derive(Deserialize)]
struct RagRequest {
    #[serde(default)]
    query: String,
    limit: Option<usize>,
    include_context: Option<bool>,
}

async fn handle_rag(
    State(state): State<AppState>,
    payload: Result<Json<RagRequest>, JsonRejection>,
) -> Result<Json<DataBody<RagAnswer>>, AppError> {
    let req = body(payload)?;
    let limit = req.limit.unwrap_or(state.retrieval.rag_limit);
    let include_context = req
        .include_context
        .unwrap_or(state.retrieval.include_context);

    let mut answer = state.engine.ask(&req.query, limit).await?;
    if !include_context {
        answer.context.clear();
    }
    Ok(data(answer))
}
