//! Query intent classification via LLM.
//!
//! One single-shot call with a fixed taxonomy prompt and a small output
//! budget, expecting `{"intent": ..., "needs_history": bool}`. Parsing is
//! defensive: fenced output is unwrapped first, and any call or parse
//! failure yields the general/needs-history fallback -- classification
//! failure must never block the turn.

use std::time::Duration;

use serde::Deserialize;

use mnemo_types::context::{IntentDecision, QueryIntent};
use mnemo_types::llm::{CompletionRequest, Message};

use crate::llm::box_provider::BoxLlmProvider;

/// Taxonomy prompt for the classification call.
const INTENT_SYSTEM_PROMPT: &str = r#"Classify the user's query into exactly one intent category:

- "followup": references prior turns of this conversation ("what did you just say?", "and then?")
- "factual": asks for a specific remembered fact about the user ("what's my dog's name?")
- "overview": asks for a summary or status of the conversation so far
- "new_topic": an unrelated fresh topic with no connection to prior turns
- "general": anything else

Respond with ONLY a JSON object, no prose:
{"intent": "<category>", "needs_history": <true|false>}

Set "needs_history" to true when answering well would require conversation context."#;

/// Raw classifier output before validation.
#[derive(Debug, Deserialize)]
struct RawDecision {
    intent: String,
    #[serde(default = "default_needs_history")]
    needs_history: bool,
}

fn default_needs_history() -> bool {
    true
}

/// Stateless single-shot intent classifier.
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify a query. Infallible: every failure path collapses to
    /// [`IntentDecision::fallback`].
    #[tracing::instrument(name = "classify_intent", skip(provider, query), fields(query_len = query.len()))]
    pub async fn classify(
        provider: &BoxLlmProvider,
        model: &str,
        query: &str,
        timeout: Duration,
    ) -> IntentDecision {
        let request = CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(query)],
            system: Some(INTENT_SYSTEM_PROMPT.to_string()),
            max_tokens: 64,
            temperature: Some(0.0),
            tools: None,
        };

        let response = match provider.complete_with_timeout(&request, timeout).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Intent classification call failed; using fallback");
                return IntentDecision::fallback();
            }
        };

        Self::parse(&response.content)
    }

    /// Parse the raw model output into a decision, falling back on any
    /// malformed content.
    fn parse(raw: &str) -> IntentDecision {
        let stripped = strip_code_fence(raw);

        let raw_decision: RawDecision = match serde_json::from_str(stripped.trim()) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    content_preview = &stripped[..stripped.len().min(120)],
                    "Failed to parse intent JSON; using fallback"
                );
                return IntentDecision::fallback();
            }
        };

        let intent: QueryIntent = match raw_decision.intent.parse() {
            Ok(intent) => intent,
            Err(_) => {
                tracing::warn!(intent = %raw_decision.intent, "Unknown intent category; using fallback");
                return IntentDecision::fallback();
            }
        };

        IntentDecision {
            intent,
            needs_history: raw_decision.needs_history,
        }
    }
}

/// Strip a surrounding markdown code fence (with or without a language tag)
/// from model output.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.to_string(),
    };

    without_open
        .trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let decision = IntentClassifier::parse(r#"{"intent": "factual", "needs_history": false}"#);
        assert_eq!(decision.intent, QueryIntent::Factual);
        assert!(!decision.needs_history);
    }

    #[test]
    fn test_parse_fenced_json() {
        let decision = IntentClassifier::parse(
            "```json\n{\"intent\": \"new_topic\", \"needs_history\": false}\n```",
        );
        assert_eq!(decision.intent, QueryIntent::NewTopic);
        assert!(!decision.needs_history);
    }

    #[test]
    fn test_parse_fence_without_language_tag() {
        let decision =
            IntentClassifier::parse("```\n{\"intent\": \"overview\", \"needs_history\": true}\n```");
        assert_eq!(decision.intent, QueryIntent::Overview);
        assert!(decision.needs_history);
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        let decision = IntentClassifier::parse("I think this is a followup question.");
        assert_eq!(decision.intent, QueryIntent::General);
        assert!(decision.needs_history);
    }

    #[test]
    fn test_parse_unknown_category_falls_back() {
        let decision = IntentClassifier::parse(r#"{"intent": "banter", "needs_history": false}"#);
        assert_eq!(decision.intent, QueryIntent::General);
        assert!(decision.needs_history);
    }

    #[test]
    fn test_parse_missing_needs_history_defaults_true() {
        let decision = IntentClassifier::parse(r#"{"intent": "followup"}"#);
        assert_eq!(decision.intent, QueryIntent::Followup);
        assert!(decision.needs_history);
    }

    #[test]
    fn test_strip_code_fence_passthrough() {
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_intent_prompt_lists_all_categories() {
        for category in ["followup", "factual", "overview", "new_topic", "general"] {
            assert!(INTENT_SYSTEM_PROMPT.contains(category));
        }
        assert!(INTENT_SYSTEM_PROMPT.contains("needs_history"));
    }
}
