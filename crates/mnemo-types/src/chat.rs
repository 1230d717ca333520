//! Transcript store record types.
//!
//! Sessions and messages as persisted by the durable transcript store.
//! Each session row owns one rolling summary string, overwritten (not
//! appended) on each background update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::llm::MessageRole;

/// A chat session between a user and the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub title: Option<String>,
    /// Rolling summary, bounded to roughly 150 words; None until the
    /// background summarizer first runs.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single persisted message within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
