//! TranscriptStore trait definition.
//!
//! The durable transcript boundary: an append-only message log plus one
//! rolling summary per session, with full-text search. Implementations
//! live in mnemo-infra (e.g., `SqliteTranscriptStore`).
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use mnemo_types::chat::{SessionRecord, StoredMessage};
use mnemo_types::error::RepositoryError;
use mnemo_types::llm::MessageRole;
use uuid::Uuid;

/// Repository trait for durable transcript persistence.
pub trait TranscriptStore: Send + Sync {
    /// Create a new session for an owner.
    fn create_session(
        &self,
        owner_id: &str,
        title: Option<String>,
    ) -> impl std::future::Future<Output = Result<SessionRecord, RepositoryError>> + Send;

    /// Get a session by ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, RepositoryError>> + Send;

    /// List an owner's sessions, most recently updated first.
    fn list_sessions(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SessionRecord>, RepositoryError>> + Send;

    /// Delete a session and all its messages (cascading).
    fn delete_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Append a message to a session's log and bump the session's
    /// `updated_at`.
    fn append_message(
        &self,
        session_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<StoredMessage, RepositoryError>> + Send;

    /// The last `limit` messages of a session, in chronological order.
    fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, RepositoryError>> + Send;

    /// Total messages in a session.
    fn message_count(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// The session's rolling summary, if one has been written.
    fn get_summary(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Overwrite the session's rolling summary.
    fn set_summary(
        &self,
        session_id: &Uuid,
        summary: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Full-text search over message content; returns matching sessions,
    /// most recently updated first.
    fn search_sessions(
        &self,
        owner_id: &str,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SessionRecord>, RepositoryError>> + Send;

    /// Total sessions in the store (for backup counts).
    fn session_count(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Total messages in the store (for backup counts).
    fn total_message_count(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Flush the write-ahead log into the main database file so a file copy
    /// captures all committed state.
    fn checkpoint(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
