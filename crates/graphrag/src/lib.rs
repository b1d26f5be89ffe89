//! # GraphRAG
//!
//! **Document ingestion, knowledge-graph extraction and retrieval-augmented
//! question answering.**
//!
//! This crate wires the runtime-agnostic [`graphrag_core`] engine to
//! concrete infrastructure: SQLite or Neo4j storage, OpenAI or Ollama
//! embeddings, an OpenAI chat model, file text extraction, a CLI and an
//! HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Extract    │──▶│ Chunk+Embed  │──▶│ SQLite/Neo4j │
//! │ PDF/TXT/CSV │   │ Extract graph│   │ chunks+graph │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                        ┌────────────────────┤
//!                        ▼                    ▼
//!                   ┌──────────┐        ┌──────────┐
//!                   │   CLI    │        │   HTTP   │
//!                   │(graphrag)│        │  (Axum)  │
//!                   └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! graphrag init                          # create database
//! graphrag ingest ./docs/handbook.pdf    # extract, chunk, embed, store, build graph
//! graphrag search "deployment process"
//! graphrag ask "Who owns the billing service?"
//! graphrag serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema (idempotent) |
//! | [`sqlite_store`] | `GraphStore` over SQLite |
//! | [`neo4j_store`] | `GraphStore` over the Neo4j HTTP API |
//! | [`embedding`] | OpenAI and Ollama embedding providers |
//! | [`llm`] | OpenAI chat provider |
//! | [`extract`] | PDF, TXT and CSV text extraction |
//! | [`engine`] | Builds the shared `RagEngine` from config |
//! | [`ingest`] | `extract`, `chunk` and `ingest` commands |
//! | [`search`] | `search` and `ask` commands |
//! | [`server`] | HTTP server (Axum) with CORS |

pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod neo4j_store;
mod retry;
pub mod search;
pub mod server;
pub mod sqlite_store;

pub use graphrag_core::{RagEngine, RagError};
