//! Retrieval with native search and in-process fallback.
//!
//! [`retrieve`] first asks the store for its own vector-similarity
//! operator. If the store has none, or the call fails, every stored
//! embedding is fetched and ranked with [`rank_and_limit`]. Either way the
//! caller gets the same ordering (similarity descending, ties stable) and
//! at most `limit` results.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::models::RetrievalResult;
use crate::similarity::{rank_and_limit, sort_and_truncate};
use crate::store::GraphStore;

/// Which path produced a [`Retrieval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPath {
    Native,
    Fallback,
}

impl RetrievalPath {
    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalPath::Native => "native",
            RetrievalPath::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub results: RetrievalResult,
    pub path: RetrievalPath,
}

/// Return the `limit` stored chunks most similar to `query_vec`.
///
/// Fails with [`RagError::InvalidInput`] for a zero limit and with
/// [`RagError::ExhaustedFallback`] when both paths fail. Never returns
/// partial results.
pub async fn retrieve(
    store: &dyn GraphStore,
    query_vec: &[f32],
    limit: usize,
) -> Result<Retrieval> {
    if limit == 0 {
        return Err(RagError::invalid("limit must be at least 1"));
    }

    let native_failure = match store.native_vector_search(query_vec, limit).await {
        Ok(Some(mut results)) => {
            sort_and_truncate(&mut results, limit);
            debug!(
                backend = store.backend_name(),
                hits = results.len(),
                "native vector search"
            );
            return Ok(Retrieval {
                results,
                path: RetrievalPath::Native,
            });
        }
        Ok(None) => "native vector search not supported".to_string(),
        Err(e) => e.to_string(),
    };

    warn!(
        backend = store.backend_name(),
        reason = %native_failure,
        "native vector search unavailable, falling back to in-process cosine"
    );

    let fallback = async {
        let candidates = store.fetch_all_chunks_with_embeddings().await?;
        rank_and_limit(query_vec, &candidates, limit)
    };

    match fallback.await {
        Ok(results) => Ok(Retrieval {
            results,
            path: RetrievalPath::Fallback,
        }),
        Err(e) => Err(RagError::ExhaustedFallback {
            native: native_failure,
            fallback: e.to_string(),
        }),
    }
}
