//! Vector memory store trait.
//!
//! A collection of (vector, payload) points filterable by owner and
//! session: similarity query, exhaustive scroll, deletion by id or filter,
//! and collection recreation (for restore). Implementations live in
//! mnemo-infra (e.g., the LanceDB-backed store).
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use mnemo_types::error::RepositoryError;
use mnemo_types::memory::{MemoryFilter, MemoryPoint, ScoredMemory};
use uuid::Uuid;

/// Trait for vector-indexed memory storage with semantic search.
pub trait VectorStore: Send + Sync {
    /// Insert points, replacing any existing points with the same ids.
    fn upsert(
        &self,
        points: &[MemoryPoint],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Similarity search; returns up to `limit` hits ranked by cosine
    /// similarity descending.
    fn search(
        &self,
        query_vector: &[f32],
        filter: &MemoryFilter,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredMemory>, RepositoryError>> + Send;

    /// Page through matching points (vectors included). Order is
    /// unspecified but stable across a single scroll.
    fn scroll(
        &self,
        filter: &MemoryFilter,
        offset: usize,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<MemoryPoint>, RepositoryError>> + Send;

    /// Delete points by id.
    fn delete(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete all points matching the filter. Returns the count deleted.
    fn delete_by_filter(
        &self,
        filter: &MemoryFilter,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Total points in the collection.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Drop the collection and recreate it empty, sized to `dimension`.
    ///
    /// Used on restore, where the dimension is detected from the first
    /// exported point.
    fn recreate(
        &self,
        dimension: usize,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Exhaustively scroll every point out of the store in fixed-size pages.
///
/// Used by the durability manager to export the full collection.
pub async fn scroll_all<V: VectorStore>(
    store: &V,
    page_size: usize,
) -> Result<Vec<MemoryPoint>, RepositoryError> {
    scroll_all_for(store, &MemoryFilter::default(), page_size).await
}

/// Exhaustively scroll every point matching `filter` in fixed-size pages.
pub async fn scroll_all_for<V: VectorStore>(
    store: &V,
    filter: &MemoryFilter,
    page_size: usize,
) -> Result<Vec<MemoryPoint>, RepositoryError> {
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page = store.scroll(filter, offset, page_size).await?;
        let fetched = page.len();
        all.extend(page);
        if fetched < page_size {
            break;
        }
        offset += fetched;
    }

    Ok(all)
}
