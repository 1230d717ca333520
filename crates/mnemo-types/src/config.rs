//! Application configuration for Mnemo.
//!
//! Deserialized from `config.toml` in the data directory. Every field has a
//! default so a missing or partial file still yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    /// Identity attached to all memories and sessions.
    pub owner_id: OwnerId,
    /// Environment tag recorded in backup manifest entries.
    pub environment: Environment,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub agent: AgentSettings,
    pub backup: BackupSettings,
}

/// Newtype-ish wrappers so `#[serde(default)]` can carry non-trivial defaults
/// for the two top-level string fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl Default for OwnerId {
    fn default() -> Self {
        Self("default_user".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(pub String);

impl Default for Environment {
    fn default() -> Self {
        Self("dev".to_string())
    }
}

/// Chat-completion endpoint settings (OpenAI-compatible wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Hard ceiling on every chat-completion call.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: "lm-studio".to_string(),
            model: "qwen2.5-vl-30b-instruct".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

/// Embedding endpoint settings (may differ from the chat endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Dimensionality of the embedding vectors; the vector store sizes its
    /// collection to this (or to the detected dimension on restore).
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: "lm-studio".to_string(),
            model: "text-embedding-bge-m3".to_string(),
            dimension: 768,
            timeout_secs: 30,
        }
    }
}

/// Web search tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub enabled: bool,
    /// Base URL of a SearxNG-compatible JSON search endpoint.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Maximum number of sources included in a result.
    pub max_results: usize,
    /// Each source snippet is truncated to this many characters.
    pub snippet_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8888".to_string(),
            timeout_secs: 20,
            max_results: 4,
            snippet_limit: 1000,
        }
    }
}

/// Orchestration and memory policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Hard bound on reason->tools round trips per turn.
    pub tool_round_limit: u32,
    /// Maximum facts injected into a context bundle.
    pub facts_limit: usize,
    /// Minimum cosine similarity for a fact to be included.
    pub facts_threshold: f32,
    /// Summarize when the session's message count is a positive multiple
    /// of this value.
    pub summarize_every: u32,
    /// Word ceiling instructed to the summarizer.
    pub summary_word_limit: usize,
    /// Messages read when refreshing the rolling summary.
    pub summary_window: i64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            tool_round_limit: 3,
            facts_limit: 5,
            facts_threshold: 0.5,
            summarize_every: 5,
            summary_word_limit: 150,
            summary_window: 20,
        }
    }
}

/// Durability manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Manifest entries kept; older entries and their snapshot files are
    /// deleted when this cap is exceeded.
    pub retention: usize,
    /// Take an automatic safety backup before any restore.
    pub auto_backup_before_restore: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            retention: 5,
            auto_backup_before_restore: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MnemoConfig::default();
        assert_eq!(config.owner_id.0, "default_user");
        assert_eq!(config.environment.0, "dev");
        assert_eq!(config.agent.tool_round_limit, 3);
        assert!((config.agent.facts_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.agent.summarize_every, 5);
        assert_eq!(config.backup.retention, 5);
        assert!(config.backup.auto_backup_before_restore);
        assert_eq!(config.search.max_results, 4);
        assert_eq!(config.search.snippet_limit, 1000);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
owner_id = "alice"

[llm]
model = "gpt-4o-mini"

[backup]
retention = 2
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.owner_id.0, "alice");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        // Unspecified llm fields keep their defaults
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.backup.retention, 2);
        assert!(config.backup.auto_backup_before_restore);
        // Untouched sections are fully defaulted
        assert_eq!(config.embedding.dimension, 768);
        assert!(config.search.enabled);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: MnemoConfig = toml::from_str("").unwrap();
        assert_eq!(config.agent.facts_limit, 5);
        assert_eq!(config.llm.max_tokens, 1024);
    }
}
