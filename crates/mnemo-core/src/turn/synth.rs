//! Response synthesis with context hygiene.
//!
//! When the reasoning loop terminated on tool calls (no final text), the
//! synthesizer folds the raw tool outputs into one answer with a second LLM
//! call. The history included in that call is hygiene-filtered: system and
//! tool messages are dropped so pronoun resolution works without leaking
//! tool plumbing into the synthesis context.

use std::time::Duration;

use mnemo_types::llm::{CompletionRequest, Message, MessageRole};

use crate::llm::box_provider::BoxLlmProvider;

/// The sole terminal fallback when a turn cannot produce any content.
pub const APOLOGY: &str = "I couldn't find any information to help with that.";

/// Separator between joined tool outputs.
const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Stateless response synthesizer.
pub struct ResponseSynthesizer;

impl ResponseSynthesizer {
    /// Produce the final response for a finished reasoning loop.
    ///
    /// Never errors: every failure path collapses to [`APOLOGY`].
    #[tracing::instrument(name = "synthesize_response", skip_all)]
    pub async fn synthesize(
        provider: &BoxLlmProvider,
        model: &str,
        messages: &[Message],
        user_input: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> String {
        // The model already answered in text: use it directly.
        if let Some(last) = messages.last()
            && last.role == MessageRole::Assistant
            && last.has_text()
        {
            return last.content.clone();
        }

        let tool_results = collect_tool_results(messages);
        if tool_results.is_empty() {
            return APOLOGY.to_string();
        }

        let joined = tool_results
            .iter()
            .enumerate()
            .map(|(i, content)| format!("SOURCE {}:\n{}", i + 1, content))
            .collect::<Vec<_>>()
            .join(RESULT_SEPARATOR);

        let synthesis_prompt = format!(
            r#"Answer the user based on the search results below.

CONTEXT:
User asked: "{user_input}"

SEARCH RESULTS:
{joined}

INSTRUCTIONS:
1. Synthesize a conversational answer using ONLY the search results.
2. Use EXACT numbers, prices, and facts - do NOT make up data.
3. Cite sources (SOURCE 1, SOURCE 2, etc.) when referencing information.
4. If the results don't contain the answer, admit it honestly.
5. Be concise."#
        );

        let mut synthesis_messages = clean_history(messages);
        synthesis_messages.push(Message::user(synthesis_prompt));

        let request = CompletionRequest {
            model: model.to_string(),
            messages: synthesis_messages,
            system: Some("You are a helpful AI assistant.".to_string()),
            max_tokens,
            temperature: None,
            tools: None,
        };

        match provider.complete_with_timeout(&request, timeout).await {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => {
                tracing::warn!("Synthesis call returned empty content");
                APOLOGY.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Synthesis call failed");
                APOLOGY.to_string()
            }
        }
    }
}

/// Context hygiene: keep user messages and assistant messages with
/// non-empty text; drop system and tool messages and empty assistant
/// tool-call shells.
pub fn clean_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| match m.role {
            MessageRole::User => true,
            MessageRole::Assistant => m.has_text(),
            MessageRole::System | MessageRole::Tool => false,
        })
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        })
        .collect()
}

/// Every tool-result message's content, in message order.
pub fn collect_tool_results(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .map(|m| m.content.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LlmProvider;
    use mnemo_types::llm::{CompletionResponse, LlmError, StopReason, ToolCall, Usage};

    struct CannedProvider {
        content: String,
    }

    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                id: "resp".to_string(),
                content: self.content.clone(),
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                tool_calls: vec![],
                usage: Usage::default(),
            })
        }
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_direct_text_needs_no_second_call() {
        // A provider that would panic the test if called
        struct PanicProvider;
        impl LlmProvider for PanicProvider {
            fn name(&self) -> &str {
                "panic"
            }
            async fn complete(
                &self,
                _request: &CompletionRequest,
            ) -> Result<CompletionResponse, LlmError> {
                panic!("synthesizer must not call the model when text exists");
            }
        }

        let provider = BoxLlmProvider::new(PanicProvider);
        let messages = vec![Message::user("hi"), Message::assistant("Hello there!")];
        let out = ResponseSynthesizer::synthesize(
            &provider,
            "m",
            &messages,
            "hi",
            256,
            timeout(),
        )
        .await;
        assert_eq!(out, "Hello there!");
    }

    #[tokio::test]
    async fn test_tool_results_trigger_synthesis() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "It is 18C in Paris (SOURCE 1).".to_string(),
        });
        let messages = vec![
            Message::user("What's the weather in Paris?"),
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "web_search".to_string(),
                    arguments: serde_json::json!({"query": "Paris weather"}),
                }],
            ),
            Message::tool_result("c1", "Paris: 18C, partly cloudy"),
        ];
        let out = ResponseSynthesizer::synthesize(
            &provider,
            "m",
            &messages,
            "What's the weather in Paris?",
            256,
            timeout(),
        )
        .await;
        assert_eq!(out, "It is 18C in Paris (SOURCE 1).");
    }

    #[tokio::test]
    async fn test_no_content_at_all_yields_apology() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "unused".to_string(),
        });
        let out =
            ResponseSynthesizer::synthesize(&provider, "m", &[], "hi", 256, timeout()).await;
        assert_eq!(out, APOLOGY);
    }

    #[tokio::test]
    async fn test_failed_synthesis_yields_apology() {
        struct FailingProvider;
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: &CompletionRequest,
            ) -> Result<CompletionResponse, LlmError> {
                Err(LlmError::Provider {
                    message: "boom".to_string(),
                })
            }
        }

        let provider = BoxLlmProvider::new(FailingProvider);
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "web_search".to_string(),
                    arguments: serde_json::json!({"query": "q"}),
                }],
            ),
            Message::tool_result("c1", "some result"),
        ];
        let out = ResponseSynthesizer::synthesize(&provider, "m", &messages, "q", 256, timeout())
            .await;
        assert_eq!(out, APOLOGY);
    }

    #[test]
    fn test_clean_history_drops_plumbing() {
        let messages = vec![
            Message::system("system stuff"),
            Message::user("question"),
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "web_search".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool_result("c1", "raw result"),
            Message::assistant("A real text answer"),
        ];
        let cleaned = clean_history(&messages);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].role, MessageRole::User);
        assert_eq!(cleaned[1].content, "A real text answer");
        assert!(cleaned[1].tool_calls.is_empty());
    }

    #[test]
    fn test_collect_tool_results_order() {
        let messages = vec![
            Message::tool_result("c1", "first"),
            Message::user("x"),
            Message::tool_result("c2", "second"),
        ];
        assert_eq!(collect_tool_results(&messages), vec!["first", "second"]);
    }
}
