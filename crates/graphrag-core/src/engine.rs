//! The RAG engine: ingestion and query flows over injected collaborators.
//!
//! [`RagEngine`] owns an embedding provider, a graph store and a chat
//! provider behind `Arc<dyn …>`. The application builds them once at
//! startup and shares one engine across the CLI and HTTP server.
//!
//! | Method | Flow |
//! |--------|------|
//! | [`chunk_document`](RagEngine::chunk_document) | document → chunks |
//! | [`embed_chunks`](RagEngine::embed_chunks) | chunks → embedded chunks |
//! | [`store_chunks`](RagEngine::store_chunks) | embedded chunks → store |
//! | [`extract_graph`](RagEngine::extract_graph) | chunks → LLM → graph |
//! | [`store_graph`](RagEngine::store_graph) | graph → store |
//! | [`ingest`](RagEngine::ingest) | all of the above |
//! | [`semantic_search`](RagEngine::semantic_search) | query → ranked chunks |
//! | [`ask`](RagEngine::ask) | query → ranked chunks → answer with citations |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::chunk::{chunk_text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::context::{assemble_context, AssembledContext, SourceCitation, NO_RELEVANT_INFORMATION};
use crate::embedding::{embed_all, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::graph::{parse_extraction, validate_embedded_chunks, validate_text_chunks, ExtractedGraph};
use crate::llm::ChatProvider;
use crate::models::{Document, EmbeddedChunk, ScoredCandidate, TextChunk};
use crate::prompt;
use crate::retrieve::{retrieve, RetrievalPath};
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Run entity extraction and store the graph after the chunks.
    pub extract_graph: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            extract_graph: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub title: String,
    pub chunks_stored: usize,
    /// `None` when extraction was skipped.
    pub graph: Option<ExtractedGraph>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredCandidate>,
    pub count: usize,
    pub path: RetrievalPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    /// The retrieved chunks the answer was generated from. Omitted from
    /// the serialized form when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ScoredCandidate>,
    pub chunks_retrieved: usize,
    pub avg_similarity: Option<f64>,
}

pub struct RagEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn GraphStore>,
    chat: Arc<dyn ChatProvider>,
    chunk_size: usize,
    overlap: usize,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn GraphStore>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    /// `(chunk_size, overlap)` used by [`chunk_text`](Self::chunk_text).
    pub fn chunk_settings(&self) -> (usize, usize) {
        (self.chunk_size, self.overlap)
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Chunk raw text with the engine's settings, without a parent document.
    pub fn chunk_text(&self, text: &str) -> Vec<TextChunk> {
        chunk_text(text, self.chunk_size, self.overlap)
    }

    /// Chunk a document; ids become `{document_id}:chunk-{n}`.
    pub fn chunk_document(&self, document: &Document) -> Vec<TextChunk> {
        self.chunk_text(&document.content)
            .into_iter()
            .map(|c| {
                let mut c = c.scoped_to(&document.id);
                c.metadata
                    .insert("title".to_string(), Value::String(document.title.clone()));
                c
            })
            .collect()
    }

    /// Embed `chunks` in one batch. The result is index-aligned.
    pub async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<EmbeddedChunk>> {
        if chunks.is_empty() {
            return Err(RagError::invalid("chunks array required"));
        }
        validate_text_chunks(chunks)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), &texts).await?;
        debug!(
            count = vectors.len(),
            model = self.embedder.model_name(),
            "embedded chunks"
        );

        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(c, embedding)| EmbeddedChunk {
                id: c.id.clone(),
                content: c.content.clone(),
                embedding,
                metadata: c.metadata.clone(),
            })
            .collect())
    }

    pub async fn store_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        validate_embedded_chunks(chunks)?;
        self.store.write_chunks(chunks).await
    }

    /// Ask the chat model for the entities and relationships in `chunks`.
    pub async fn extract_graph(&self, chunks: &[TextChunk]) -> Result<ExtractedGraph> {
        if chunks.is_empty() {
            return Err(RagError::invalid("chunks array required"));
        }
        validate_text_chunks(chunks)?;

        let messages = prompt::extraction_messages(chunks);
        let raw = self
            .chat
            .complete(&messages, &prompt::extraction_options())
            .await?;
        let graph = parse_extraction(&raw)?;
        debug!(
            nodes = graph.nodes.len(),
            relationships = graph.relationships.len(),
            "extracted graph"
        );
        Ok(graph)
    }

    pub async fn store_graph(&self, graph: &ExtractedGraph) -> Result<()> {
        self.store.store_graph(graph).await
    }

    /// Chunk, embed and store a document, then optionally extract and
    /// store its graph. Graph ids are scoped to the document, see
    /// [`ExtractedGraph::scoped_to`].
    pub async fn ingest(&self, document: &Document, options: IngestOptions) -> Result<IngestReport> {
        let chunks = self.chunk_document(document);
        if chunks.is_empty() {
            return Err(RagError::invalid(format!(
                "document {} has no text to ingest",
                document.id
            )));
        }

        let embedded = self.embed_chunks(&chunks).await?;
        self.store.write_document(document).await?;
        self.store_chunks(&embedded).await?;

        let graph = if options.extract_graph {
            let graph = self.extract_graph(&chunks).await?.scoped_to(&document.id);
            self.store_graph(&graph).await?;
            Some(graph)
        } else {
            None
        };

        info!(
            document = %document.id,
            chunks = embedded.len(),
            entities = graph.as_ref().map(|g| g.nodes.len()).unwrap_or(0),
            "ingested document"
        );

        Ok(IngestReport {
            document_id: document.id.clone(),
            title: document.title.clone(),
            chunks_stored: embedded.len(),
            graph,
        })
    }

    /// Rank stored chunks against `query`.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(RagError::invalid("query string is required"));
        }
        let query_vec = self.embedder.embed(query).await?;
        let retrieval = retrieve(self.store.as_ref(), &query_vec, limit).await?;

        Ok(SearchResponse {
            query: query.to_string(),
            count: retrieval.results.len(),
            results: retrieval.results,
            path: retrieval.path,
        })
    }

    /// Answer `query` from the `limit` most similar chunks.
    ///
    /// When nothing is retrieved the fixed
    /// [`NO_RELEVANT_INFORMATION`] answer is returned and the chat model
    /// is not called.
    pub async fn ask(&self, query: &str, limit: usize) -> Result<RagAnswer> {
        let search = self.semantic_search(query, limit).await?;

        match assemble_context(&search.results) {
            AssembledContext::NoRelevantInformation => Ok(RagAnswer {
                query: search.query,
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
                context: Vec::new(),
                chunks_retrieved: 0,
                avg_similarity: None,
            }),
            AssembledContext::Found {
                context_text,
                sources,
                avg_similarity,
            } => {
                let messages = prompt::rag_messages(query, &context_text);
                let answer = self
                    .chat
                    .complete(&messages, &prompt::answer_options())
                    .await?;
                Ok(RagAnswer {
                    query: search.query,
                    answer,
                    sources,
                    chunks_retrieved: search.count,
                    context: search.results,
                    avg_similarity: Some(avg_similarity),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Map;

    use super::*;
    use crate::llm::{ChatMessage, CompletionOptions, ResponseFormat};
    use crate::store::memory::InMemoryStore;

    const KEYWORDS: [&str; 3] = ["rust", "python", "graph"];

    /// Counts keyword occurrences, plus a small constant axis.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            KEYWORDS.len() + 1
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    let mut v: Vec<f32> = KEYWORDS
                        .iter()
                        .map(|k| lower.matches(k).count() as f32)
                        .collect();
                    v.push(0.1);
                    v
                })
                .collect())
        }
    }

    struct ScriptedChat {
        reply: String,
        calls: AtomicUsize,
        last_format: Mutex<Option<ResponseFormat>>,
    }

    impl ScriptedChat {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                last_format: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            options: &CompletionOptions,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_format.lock().unwrap() = Some(options.response_format);
            Ok(self.reply.clone())
        }
    }

    fn engine(chat: Arc<ScriptedChat>) -> (RagEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = RagEngine::new(Arc::new(KeywordEmbedder), store.clone(), chat)
            .with_chunking(40, 0);
        (engine, store)
    }

    fn document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("{}.txt", id),
            content: content.to_string(),
            content_type: "txt".to_string(),
            metadata: Map::new(),
        }
    }

    const GRAPH_REPLY: &str = r#"{"nodes":[{"id":"rust","name":"Rust","type":"technology"}],"relationships":[]}"#;

    #[tokio::test]
    async fn test_ingest_then_search() {
        let chat = Arc::new(ScriptedChat::new(GRAPH_REPLY));
        let (engine, store) = engine(chat.clone());

        let doc = document(
            "doc-1",
            "Rust is a systems language, rust rust. Python is a scripting language.",
        );
        let report = engine.ingest(&doc, IngestOptions::default()).await.unwrap();
        assert_eq!(report.chunks_stored, 2);
        assert_eq!(report.graph.as_ref().unwrap().nodes.len(), 1);
        assert_eq!(store.chunk_count(), 2);
        assert!(store.entity("doc-1:rust").is_some());
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *chat.last_format.lock().unwrap(),
            Some(ResponseFormat::JsonObject)
        );

        let search = engine.semantic_search("rust", 1).await.unwrap();
        assert_eq!(search.count, 1);
        assert_eq!(search.results[0].id, "doc-1:chunk-0");
        assert_eq!(search.path, RetrievalPath::Fallback);
    }

    #[tokio::test]
    async fn test_ingest_without_graph_skips_llm() {
        let chat = Arc::new(ScriptedChat::new("not json"));
        let (engine, _) = engine(chat.clone());
        let report = engine
            .ingest(
                &document("d", "graph databases"),
                IngestOptions {
                    extract_graph: false,
                },
            )
            .await
            .unwrap();
        assert!(report.graph.is_none());
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_bad_extraction_is_parse_error() {
        let chat = Arc::new(ScriptedChat::new("I found some entities!"));
        let (engine, _) = engine(chat);
        let err = engine
            .ingest(&document("d", "graph databases"), IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Parse(_)));
    }

    #[tokio::test]
    async fn test_ingest_empty_document_rejected() {
        let (engine, _) = engine(Arc::new(ScriptedChat::new(GRAPH_REPLY)));
        let err = engine
            .ingest(&document("d", "   "), IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_embed_chunks_aligned_and_rejects_empty() {
        let (engine, _) = engine(Arc::new(ScriptedChat::new("")));
        assert!(matches!(
            engine.embed_chunks(&[]).await,
            Err(RagError::InvalidInput(_))
        ));

        let chunks = engine.chunk_text("python python python and then some rust here");
        let embedded = engine.embed_chunks(&chunks).await.unwrap();
        assert_eq!(embedded.len(), chunks.len());
        assert_eq!(embedded[0].id, chunks[0].id);
        assert_eq!(embedded[0].embedding[1], 3.0);
    }

    #[tokio::test]
    async fn test_ask_with_no_chunks_does_not_call_llm() {
        let chat = Arc::new(ScriptedChat::new("should not be used"));
        let (engine, _) = engine(chat.clone());
        let answer = engine.ask("anything about rust?", 5).await.unwrap();
        assert_eq!(answer.answer, NO_RELEVANT_INFORMATION);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.avg_similarity, None);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_generates_with_citations() {
        let chat = Arc::new(ScriptedChat::new("Rust is a systems language [1]."));
        let (engine, _) = engine(chat.clone());
        engine
            .ingest(
                &document("d", "Rust is a systems language."),
                IngestOptions {
                    extract_graph: false,
                },
            )
            .await
            .unwrap();

        let answer = engine.ask("What is rust?", 5).await.unwrap();
        assert_eq!(answer.answer, "Rust is a systems language [1].");
        assert_eq!(answer.chunks_retrieved, 1);
        assert_eq!(answer.sources[0].source_number, 1);
        assert_eq!(answer.sources[0].id, "d:chunk-0");
        assert!(answer.avg_similarity.unwrap() > 0.9);
        assert_eq!(*chat.last_format.lock().unwrap(), Some(ResponseFormat::Text));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let (engine, _) = engine(Arc::new(ScriptedChat::new("")));
        assert!(matches!(
            engine.semantic_search("  ", 3).await,
            Err(RagError::InvalidInput(_))
        ));
    }
}
