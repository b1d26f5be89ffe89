//! Context assembly for answer generation.
//!
//! Turns ranked chunks into the numbered context block handed to the
//! language model, the matching citations, and the mean similarity.

use serde::{Deserialize, Serialize};

use crate::models::ScoredCandidate;

/// Characters of chunk content kept in a citation snippet.
pub const SNIPPET_CHARS: usize = 200;

/// Answer returned when retrieval finds nothing.
pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find any relevant information to answer your question.";

/// A numbered reference back to a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub id: String,
    pub snippet: String,
    pub similarity: f64,
    /// 1-based, matching the `[n]` marker in the context text.
    pub source_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssembledContext {
    NoRelevantInformation,
    Found {
        context_text: String,
        sources: Vec<SourceCitation>,
        avg_similarity: f64,
    },
}

/// Build the context block and citations for `results`, in input order.
pub fn assemble_context(results: &[ScoredCandidate]) -> AssembledContext {
    let Some(avg_similarity) = average_similarity(results) else {
        return AssembledContext::NoRelevantInformation;
    };

    let context_text = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let sources = results
        .iter()
        .enumerate()
        .map(|(i, r)| SourceCitation {
            id: r.id.clone(),
            snippet: snippet(&r.content),
            similarity: r.similarity,
            source_number: i + 1,
        })
        .collect();

    AssembledContext::Found {
        context_text,
        sources,
        avg_similarity,
    }
}

/// Arithmetic mean of the similarities, `None` for an empty slice.
pub fn average_similarity(results: &[ScoredCandidate]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let total: f64 = results.iter().map(|r| r.similarity).sum();
    Some(total / results.len() as f64)
}

// The ellipsis is appended even to short content.
fn snippet(content: &str) -> String {
    let mut s: String = content.chars().take(SNIPPET_CHARS).collect();
    s.push_str("...");
    s
}
