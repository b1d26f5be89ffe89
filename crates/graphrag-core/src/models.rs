//! Core data models that flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A contiguous window of a source text.
///
/// Offsets are counted in chars, not bytes. `start_char < end_char` and
/// `end_char` never exceeds the source length. Every field defaults on
/// deserialize so API callers may send only `id` and `content`; emptiness
/// is caught by validation, not by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub start_char: usize,
    #[serde(default)]
    pub end_char: usize,
    /// Approximate token count (`ceil(chars / 4)`).
    #[serde(default)]
    pub tokens: usize,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TextChunk {
    /// Rebind a freshly chunked `chunk-N` to its parent document.
    ///
    /// The id becomes `{document_id}:chunk-{index}` so chunks from
    /// different documents never collide in a shared store.
    pub fn scoped_to(mut self, document_id: &str) -> Self {
        self.id = format!("{}:chunk-{}", document_id, self.index);
        self.metadata.insert(
            "document_id".to_string(),
            Value::String(document_id.to_string()),
        );
        self
    }
}

/// The `(id, content, vector)` record exchanged with storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EmbeddedChunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata: Map::new(),
        }
    }
}

/// A chunk scored against a query vector.
///
/// `score` always equals `similarity`; both are kept because callers of
/// the HTTP API read either name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub content: String,
    pub similarity: f64,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(id: impl Into<String>, content: impl Into<String>, similarity: f64) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            similarity,
            score: similarity,
        }
    }
}

/// Ordered by similarity, descending, never longer than the requested limit.
pub type RetrievalResult = Vec<ScoredCandidate>;

/// A parsed source document, ready for chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub content_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
