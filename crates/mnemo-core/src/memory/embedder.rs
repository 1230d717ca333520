//! Embedder trait for text-to-vector conversion.
//!
//! Defines the interface for embedding text into fixed-length vectors for
//! semantic search. Implementations live in mnemo-infra and are expected
//! to retry transient failures internally before reporting an error.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use mnemo_types::error::RepositoryError;

/// Trait for converting text into embedding vectors.
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors. Returns one vector per input.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, RepositoryError>> + Send;

    /// The model name used for embeddings.
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
