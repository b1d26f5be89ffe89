//! Typed failures for the retrieval core.
//!
//! Everything above the chunker reports one of these kinds. The chunker
//! itself is best-effort and never returns an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed caller input: missing ids or content, mismatched vector
    /// dimensions, a zero limit, an unusable label.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An embedding, chat, or storage collaborator failed.
    #[error("{service} failed: {message}")]
    ExternalDependency { service: String, message: String },

    /// Structured output from the language model could not be interpreted.
    #[error("failed to parse model output: {0}")]
    Parse(String),

    /// Native vector search and the manual fallback both failed.
    #[error("retrieval failed: native path: {native}; fallback path: {fallback}")]
    ExhaustedFallback { native: String, fallback: String },
}

impl RagError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RagError::InvalidInput(message.into())
    }

    /// Wrap a collaborator failure, tagging it with the service name.
    pub fn external(service: impl Into<String>, err: impl std::fmt::Display) -> Self {
        RagError::ExternalDependency {
            service: service.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
