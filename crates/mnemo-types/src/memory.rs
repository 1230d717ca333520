//! Long-term memory types for Mnemo.
//!
//! Durable memory records live in the vector store as (vector, payload)
//! points, filterable by owner and session, created by the memory writer
//! after a turn completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// How a memory record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A single factual sentence distilled by the LLM.
    ExtractedFact,
    /// The raw user/assistant transcript pair, stored when extraction
    /// failed or found nothing worth keeping.
    TranscriptFallback,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::ExtractedFact => write!(f, "extracted_fact"),
            MemoryKind::TranscriptFallback => write!(f, "transcript_fallback"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extracted_fact" => Ok(MemoryKind::ExtractedFact),
            "transcript_fallback" => Ok(MemoryKind::TranscriptFallback),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// The durable payload attached to a vector point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub owner_id: String,
    /// Session the memory was written from; None for manually added facts.
    pub session_id: Option<Uuid>,
    pub text: String,
    pub kind: MemoryKind,
    pub created_at: DateTime<Utc>,
}

/// A full (id, vector, payload) point in the vector memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: MemoryPayload,
}

/// A similarity-search hit: id, relevance score, and payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub id: Uuid,
    /// Cosine similarity in [0, 1]; higher is more relevant.
    pub score: f32,
    pub payload: MemoryPayload,
}

/// Filter for vector store queries. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFilter {
    pub owner_id: Option<String>,
    pub session_id: Option<Uuid>,
}

impl MemoryFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            session_id: None,
        }
    }

    pub fn owner_session(owner_id: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            session_id: Some(session_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kind_roundtrip() {
        for kind in [MemoryKind::ExtractedFact, MemoryKind::TranscriptFallback] {
            let s = kind.to_string();
            let parsed: MemoryKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_memory_kind_serde() {
        let kind = MemoryKind::TranscriptFallback;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"transcript_fallback\"");
        let parsed: MemoryKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MemoryKind::TranscriptFallback);
    }

    #[test]
    fn test_memory_point_serde_roundtrip() {
        let point = MemoryPoint {
            id: Uuid::now_v7(),
            vector: vec![0.1, 0.2, 0.3],
            payload: MemoryPayload {
                owner_id: "default_user".to_string(),
                session_id: Some(Uuid::now_v7()),
                text: "User prefers dark mode".to_string(),
                kind: MemoryKind::ExtractedFact,
                created_at: Utc::now(),
            },
        };
        let json = serde_json::to_string(&point).unwrap();
        let parsed: MemoryPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, point);
    }

    #[test]
    fn test_memory_filter_constructors() {
        let f = MemoryFilter::owner("alice");
        assert_eq!(f.owner_id.as_deref(), Some("alice"));
        assert!(f.session_id.is_none());

        let sid = Uuid::now_v7();
        let f = MemoryFilter::owner_session("alice", sid);
        assert_eq!(f.session_id, Some(sid));
    }
}
