//! Query intent and context bundle types.
//!
//! The intent classifier maps a raw user query onto a small category set;
//! the context assembler turns that intent into a bounded bundle of memory
//! tiers consumed by one turn's reasoning step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classified intent of a user query, used to choose which memory tiers
/// to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// References prior turns ("what did I just say?").
    Followup,
    /// Asks for a specific remembered fact ("what's my dog's name?").
    Factual,
    /// Asks for a summary or status of the conversation.
    Overview,
    /// An unrelated fresh topic.
    NewTopic,
    /// Default when nothing else applies (and the failure fallback).
    General,
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryIntent::Followup => write!(f, "followup"),
            QueryIntent::Factual => write!(f, "factual"),
            QueryIntent::Overview => write!(f, "overview"),
            QueryIntent::NewTopic => write!(f, "new_topic"),
            QueryIntent::General => write!(f, "general"),
        }
    }
}

impl FromStr for QueryIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "followup" => Ok(QueryIntent::Followup),
            "factual" => Ok(QueryIntent::Factual),
            "overview" => Ok(QueryIntent::Overview),
            "new_topic" => Ok(QueryIntent::NewTopic),
            "general" => Ok(QueryIntent::General),
            other => Err(format!("invalid query intent: '{other}'")),
        }
    }
}

/// The classifier's verdict for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDecision {
    pub intent: QueryIntent,
    pub needs_history: bool,
}

impl IntentDecision {
    /// The safe default used whenever classification fails.
    pub fn fallback() -> Self {
        Self {
            intent: QueryIntent::General,
            needs_history: true,
        }
    }
}

/// The assembled three-tier context for one turn's reasoning step.
///
/// Empty strings mean "tier absent". Owned exclusively by the turn that
/// requested it; never shared across turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Tier 2: semantically retrieved facts, formatted as a bulleted list.
    pub facts: String,
    /// Tier 3: rolling session summary.
    pub summary: String,
    /// Tier 1: recent raw transcript window.
    pub recent: String,
    pub intent: QueryIntent,
}

impl Default for QueryIntent {
    fn default() -> Self {
        QueryIntent::General
    }
}
