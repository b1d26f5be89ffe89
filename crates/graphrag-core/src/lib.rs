//! # GraphRAG Core
//!
//! Runtime-agnostic logic for GraphRAG: data models, chunking, similarity
//! ranking, retrieval with native/fallback paths, context assembly,
//! graph-extraction parsing, prompts, and the provider and store traits.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. Concrete
//! providers and stores live in the `graphrag` app crate and are injected
//! into [`RagEngine`] as trait objects.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod graph;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod similarity;
pub mod store;

pub use engine::{IngestOptions, IngestReport, RagAnswer, RagEngine, SearchResponse};
pub use error::{RagError, Result};
pub use models::{Document, EmbeddedChunk, RetrievalResult, ScoredCandidate, TextChunk};
