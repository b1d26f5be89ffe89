//! Query CLI commands: `search` and `ask`.
//!
//! Both embed the query with the configured provider and rank stored
//! chunks through [`RagEngine`](graphrag_core::RagEngine); `ask` then
//! generates an answer from the top results.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::engine::build_engine;

fn require_embeddings(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    require_embeddings(config)?;
    let engine = build_engine(config).await?;
    let limit = limit.unwrap_or(config.retrieval.search_limit);
    let response = engine.semantic_search(query, limit).await?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in response.results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.similarity, result.id);
        println!(
            "    excerpt: \"{}\"",
            result.content.replace('\n', " ").trim()
        );
        println!();
    }
    println!("({} results, {} path)", response.count, response.path.as_str());
    Ok(())
}

pub async fn run_ask(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    require_embeddings(config)?;
    let engine = build_engine(config).await?;
    let limit = limit.unwrap_or(config.retrieval.rag_limit);
    let answer = engine.ask(query, limit).await?;

    println!("{}", answer.answer.trim());
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!(
                "  [Source {}] {} ({:.3})",
                source.source_number, source.id, source.similarity
            );
        }
    }
    Ok(())
}
