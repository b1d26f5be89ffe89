//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helpers for vector serialization.
//!
//! Concrete providers (OpenAI, Ollama) live in the `graphrag` app crate.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Trait for embedding providers.
///
/// Implementations are built once by the application and shared with the
/// engine as `Arc<dyn EmbeddingProvider>`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    ///
    /// The output is index-aligned with `texts`. The call is atomic: it
    /// either returns a vector for every input or fails as a whole.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text as a batch of one.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = embed_all(self, &[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::external(self.model_name(), "empty embedding response"))
    }
}

/// Call [`EmbeddingProvider::embed_batch`] and check that one vector came
/// back per input and, when the provider declares `dims() > 0`, that every
/// vector has that length.
pub async fn embed_all<P>(provider: &P, texts: &[String]) -> Result<Vec<Vec<f32>>>
where
    P: EmbeddingProvider + ?Sized,
{
    let vectors = provider.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::external(
            provider.model_name(),
            format!(
                "expected {} embeddings, received {}",
                texts.len(),
                vectors.len()
            ),
        ));
    }
    let dims = provider.dims();
    if dims > 0 {
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
            return Err(RagError::external(
                provider.model_name(),
                format!(
                    "embedding {} has {} dimensions, configured dims is {}",
                    i,
                    v.len(),
                    dims
                ),
            ));
        }
    }
    Ok(vectors)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use graphrag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            // drops the last input
            Ok(texts
                .iter()
                .skip(1)
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    /// Declares three dimensions but returns two.
    struct WrongDimsProvider;

    #[async_trait]
    impl EmbeddingProvider for WrongDimsProvider {
        fn model_name(&self) -> &str {
            "wrong-dims"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn test_blob_ignores_trailing_bytes() {
        let mut blob = vec_to_blob(&[1.5, -0.25]);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), vec![1.5, -0.25]);
    }

    #[tokio::test]
    async fn test_embed_all_rejects_misaligned_batch() {
        let texts = vec!["one".to_string(), "two".to_string()];
        let err = embed_all(&ShortProvider, &texts).await.unwrap_err();
        match err {
            RagError::ExternalDependency { service, message } => {
                assert_eq!(service, "short");
                assert!(message.contains("expected 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_all_rejects_wrong_dimensions() {
        let texts = vec!["one".to_string()];
        let err = embed_all(&WrongDimsProvider, &texts).await.unwrap_err();
        match err {
            RagError::ExternalDependency { service, message } => {
                assert_eq!(service, "wrong-dims");
                assert!(message.contains("2 dimensions"), "{}", message);
                assert!(message.contains("dims is 3"), "{}", message);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(WrongDimsProvider.embed("query").await.is_err());
    }

    #[tokio::test]
    async fn test_embed_single_uses_alignment_check() {
        // a batch of one minus one is empty
        assert!(ShortProvider.embed("hello").await.is_err());
    }
}
