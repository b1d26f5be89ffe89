//! Prompt construction for answering and entity extraction.

use crate::llm::{ChatMessage, CompletionOptions, ResponseFormat};
use crate::models::TextChunk;

const RAG_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided context.
Use the context below to answer the user's question accurately and concisely.
If the context doesn't contain enough information to answer the question, say so.
Always cite the source numbers [1], [2], etc. when referencing information from the context.";

const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are an expert at extracting entities and relationships from text.";

const EXTRACTION_CONTRACT: &str = r#"Extract entities and relationships from the text below.
Return a single valid JSON object in exactly this format:
{
  "nodes": [
    {"id": "string", "name": "string", "type": "string", "description": "string", "properties": {"key": "value"}}
  ],
  "relationships": [
    {"id": "string", "source": "string", "target": "string", "type": "string", "description": "string", "properties": {"key": "value"}}
  ]
}
Use one of Person, Organization, Location, Event, Concept, Product, Technology, Date, Document for node types where it fits.
Relationship `source` and `target` must be node ids. Use UPPER_SNAKE_CASE for relationship types."#;

/// Messages asking the model to answer `query` from numbered `context_text`.
pub fn rag_messages(query: &str, context_text: &str) -> Vec<ChatMessage> {
    let user = format!(
        "Context:\n{}\n\nQuestion: {}\n\nPlease provide a comprehensive answer based on the context above.",
        context_text, query
    );
    vec![ChatMessage::system(RAG_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Messages asking the model to extract a graph from `chunks`.
pub fn extraction_messages(chunks: &[TextChunk]) -> Vec<ChatMessage> {
    let combined = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let user = format!("{}\n\nText: \"\"\"{}\"\"\"", EXTRACTION_CONTRACT, combined);
    vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}

/// Sampling settings for answer generation.
pub fn answer_options() -> CompletionOptions {
    CompletionOptions {
        temperature: 0.3,
        max_tokens: 500,
        response_format: ResponseFormat::Text,
    }
}

/// Sampling settings for graph extraction.
pub fn extraction_options() -> CompletionOptions {
    CompletionOptions {
        temperature: 0.0,
        max_tokens: 1500,
        response_format: ResponseFormat::JsonObject,
    }
}
