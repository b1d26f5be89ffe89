//! Ingestion CLI commands: `extract`, `chunk` and `ingest`.
//!
//! `extract` and `chunk` are offline; they never touch the store or a
//! provider. `ingest` runs the full pipeline: extract → chunk → embed →
//! store → (optionally) graph extraction.

use std::path::Path;

use anyhow::{bail, Result};

use graphrag_core::chunk::chunk_text;
use graphrag_core::IngestOptions;

use crate::config::Config;
use crate::engine::build_engine;
use crate::extract::{parse_document, DocumentType};

fn parse_type(doc_type: Option<&str>) -> Result<Option<DocumentType>> {
    Ok(match doc_type {
        Some(t) => Some(t.parse()?),
        None => None,
    })
}

/// Print the extracted document as JSON.
pub fn run_extract(path: &Path, doc_type: Option<&str>) -> Result<()> {
    let document = parse_document(path, parse_type(doc_type)?)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Extract a file and print its chunks, one summary line each.
pub fn run_chunk(
    config: &Config,
    path: &Path,
    doc_type: Option<&str>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = overlap.unwrap_or(config.chunking.overlap);
    if chunk_size == 0 {
        bail!("--chunk-size must be > 0");
    }

    let document = parse_document(path, parse_type(doc_type)?)?;
    let chunks = chunk_text(&document.content, chunk_size, overlap);

    println!(
        "{}: {} chunks (size={}, overlap={})",
        document.title,
        chunks.len(),
        chunk_size,
        overlap
    );
    for chunk in &chunks {
        println!(
            "  {} [{}..{}] ~{} tokens: \"{}\"",
            chunk.id,
            chunk.start_char,
            chunk.end_char,
            chunk.tokens,
            preview(&chunk.content, 60)
        );
    }
    Ok(())
}

pub async fn run_ingest(
    config: &Config,
    path: &Path,
    doc_type: Option<&str>,
    skip_graph: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Ingestion requires embeddings. Set [embedding] provider in config.");
    }

    let document = parse_document(path, parse_type(doc_type)?)?;
    let engine = build_engine(config).await?;
    let report = engine
        .ingest(
            &document,
            IngestOptions {
                extract_graph: !skip_graph,
            },
        )
        .await?;

    println!("ingest {}", report.title);
    println!("  document: {}", report.document_id);
    println!("  chunks stored: {}", report.chunks_stored);
    match &report.graph {
        Some(graph) => {
            println!("  entities: {}", graph.nodes.len());
            println!("  relationships: {}", graph.relationships.len());
        }
        None => println!("  graph extraction: skipped"),
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
