//! SQLite transcript store implementation.
//!
//! Implements `TranscriptStore` from `mnemo-core` using sqlx with split
//! read/write pools: an append-only message log per session, one rolling
//! summary column on the session row, and FTS5 full-text search over
//! message content (kept in sync by triggers).

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use mnemo_core::chat::repository::TranscriptStore;
use mnemo_types::chat::{SessionRecord, StoredMessage};
use mnemo_types::error::RepositoryError;
use mnemo_types::llm::MessageRole;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `TranscriptStore`.
pub struct SqliteTranscriptStore {
    pool: DatabasePool,
}

impl SqliteTranscriptStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let owner_id: String = row
        .try_get("owner_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let title: Option<String> = row
        .try_get("title")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let summary: Option<String> = row
        .try_get("summary")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(SessionRecord {
        id: parse_uuid(&id)?,
        owner_id,
        title,
        summary,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let session_id: String = row
        .try_get("session_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let role: String = row
        .try_get("role")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(StoredMessage {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        role: role
            .parse::<MessageRole>()
            .map_err(RepositoryError::Query)?,
        content,
        created_at: parse_datetime(&created_at)?,
    })
}

// ---------------------------------------------------------------------------
// TranscriptStore impl
// ---------------------------------------------------------------------------

impl TranscriptStore for SqliteTranscriptStore {
    async fn create_session(
        &self,
        owner_id: &str,
        title: Option<String>,
    ) -> Result<SessionRecord, RepositoryError> {
        let session = SessionRecord {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            title,
            summary: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO sessions (id, owner_id, title, summary, created_at, updated_at)
               VALUES (?, ?, ?, NULL, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.owner_id)
        .bind(&session.title)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(session)
    }

    async fn get_session(
        &self,
        session_id: &Uuid,
    ) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<SessionRecord>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM sessions WHERE owner_id = ? ORDER BY updated_at DESC")
                .bind(owner_id)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(session_from_row).collect()
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<bool, RepositoryError> {
        // Delete messages explicitly (not via FK cascade) so the FTS sync
        // triggers always fire.
        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_message(
        &self,
        session_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage, RepositoryError> {
        let message = StoredMessage {
            id: Uuid::now_v7(),
            session_id: *session_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO messages (id, session_id, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&message.created_at))
            .bind(message.session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message)
    }

    async fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        // Take the newest `limit` rows, then flip back to chronological order.
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM messages WHERE session_id = ?
                   ORDER BY created_at DESC, id DESC LIMIT ?
               ) ORDER BY created_at ASC, id ASC"#,
        )
        .bind(session_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn message_count(&self, session_id: &Uuid) -> Result<u64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.0 as u64)
    }

    async fn get_summary(&self, session_id: &Uuid) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT summary FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let summary: Option<String> = row
                    .try_get("summary")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(summary.filter(|s| !s.is_empty()))
            }
            None => Ok(None),
        }
    }

    async fn set_summary(&self, session_id: &Uuid, summary: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE sessions SET summary = ?, updated_at = ? WHERE id = ?")
            .bind(summary)
            .bind(format_datetime(&Utc::now()))
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn search_sessions(
        &self,
        owner_id: &str,
        query: &str,
    ) -> Result<Vec<SessionRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT s.* FROM sessions s
               JOIN messages_fts fts ON s.id = fts.session_id
               WHERE s.owner_id = ? AND messages_fts MATCH ?
               ORDER BY s.updated_at DESC"#,
        )
        .bind(owner_id)
        .bind(query)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(session_from_row).collect()
    }

    async fn session_count(&self) -> Result<u64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0 as u64)
    }

    async fn total_message_count(&self) -> Result<u64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0 as u64)
    }

    async fn checkpoint(&self) -> Result<(), RepositoryError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteTranscriptStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteTranscriptStore::new(DatabasePool::new(&url).await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = test_store().await;

        let session = store
            .create_session("alice", Some("First chat".to_string()))
            .await
            .unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.owner_id, "alice");
        assert_eq!(fetched.title.as_deref(), Some("First chat"));
        assert!(fetched.summary.is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_most_recent_first() {
        let store = test_store().await;

        let s1 = store.create_session("alice", None).await.unwrap();
        let s2 = store.create_session("alice", None).await.unwrap();
        store.create_session("bob", None).await.unwrap();

        // Touch s1 so it becomes the most recently updated
        store
            .append_message(&s1.id, MessageRole::User, "hello")
            .await
            .unwrap();

        let sessions = store.list_sessions("alice").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, s1.id);
        assert_eq!(sessions[1].id, s2.id);
    }

    #[tokio::test]
    async fn test_append_and_recent_messages_chronological() {
        let store = test_store().await;
        let session = store.create_session("alice", None).await.unwrap();

        for i in 0..6 {
            store
                .append_message(&session.id, MessageRole::User, &format!("msg {i}"))
                .await
                .unwrap();
        }

        let recent = store.recent_messages(&session.id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg 3");
        assert_eq!(recent[2].content, "msg 5");

        assert_eq!(store.message_count(&session.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_summary_roundtrip_overwrites() {
        let store = test_store().await;
        let session = store.create_session("alice", None).await.unwrap();

        assert!(store.get_summary(&session.id).await.unwrap().is_none());

        store.set_summary(&session.id, "First summary").await.unwrap();
        assert_eq!(
            store.get_summary(&session.id).await.unwrap().as_deref(),
            Some("First summary")
        );

        store.set_summary(&session.id, "Second summary").await.unwrap();
        assert_eq!(
            store.get_summary(&session.id).await.unwrap().as_deref(),
            Some("Second summary")
        );
    }

    #[tokio::test]
    async fn test_set_summary_missing_session() {
        let store = test_store().await;
        let err = store.set_summary(&Uuid::now_v7(), "s").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_session_cascades_messages() {
        let store = test_store().await;
        let session = store.create_session("alice", None).await.unwrap();
        store
            .append_message(&session.id, MessageRole::User, "hello")
            .await
            .unwrap();

        let removed = store.delete_session(&session.id).await.unwrap();
        assert!(removed);
        assert!(store.get_session(&session.id).await.unwrap().is_none());
        assert_eq!(store.message_count(&session.id).await.unwrap(), 0);

        // Deleting again reports nothing removed
        assert!(!store.delete_session(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_full_text_search_finds_sessions() {
        let store = test_store().await;
        let s1 = store.create_session("alice", None).await.unwrap();
        let s2 = store.create_session("alice", None).await.unwrap();

        store
            .append_message(&s1.id, MessageRole::User, "tell me about rust lifetimes")
            .await
            .unwrap();
        store
            .append_message(&s2.id, MessageRole::User, "what's the weather in Paris")
            .await
            .unwrap();

        let hits = store.search_sessions("alice", "lifetimes").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, s1.id);

        // Owner scoping: bob sees nothing
        let hits = store.search_sessions("bob", "lifetimes").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_does_not_match_deleted_messages() {
        let store = test_store().await;
        let session = store.create_session("alice", None).await.unwrap();
        store
            .append_message(&session.id, MessageRole::User, "unicorn sightings")
            .await
            .unwrap();

        store.delete_session(&session.id).await.unwrap();

        let hits = store.search_sessions("alice", "unicorn").await.unwrap();
        assert!(hits.is_empty(), "FTS delete trigger should have fired");
    }

    #[tokio::test]
    async fn test_global_counts_and_checkpoint() {
        let store = test_store().await;
        let session = store.create_session("alice", None).await.unwrap();
        store
            .append_message(&session.id, MessageRole::User, "one")
            .await
            .unwrap();
        store
            .append_message(&session.id, MessageRole::Assistant, "two")
            .await
            .unwrap();

        assert_eq!(store.session_count().await.unwrap(), 1);
        assert_eq!(store.total_message_count().await.unwrap(), 2);

        store.checkpoint().await.unwrap();
    }
}
