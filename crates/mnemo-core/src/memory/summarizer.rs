//! Background rolling-summary maintenance.
//!
//! Triggered out-of-band when a session's message count is a positive
//! multiple of the configured cadence. Folds the recent transcript into the
//! prior summary under a strict word ceiling and overwrites the stored
//! summary. Safe to skip: any failure logs and leaves the prior summary
//! untouched.

use std::time::Duration;

use uuid::Uuid;

use mnemo_types::llm::{CompletionRequest, Message};

use crate::chat::repository::TranscriptStore;
use crate::llm::box_provider::BoxLlmProvider;

/// Settings for one summary refresh.
#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    pub model: String,
    pub timeout: Duration,
    /// Summarize when message count is a positive multiple of this.
    pub every: u32,
    /// Word ceiling instructed to the model.
    pub word_limit: usize,
    /// Messages read per refresh.
    pub window: i64,
}

/// Stateless rolling-summary maintainer.
pub struct SessionSummarizer;

impl SessionSummarizer {
    /// Whether a session at `message_count` messages is due for a refresh.
    pub fn is_due(message_count: u64, every: u32) -> bool {
        every > 0 && message_count > 0 && message_count % u64::from(every) == 0
    }

    /// Refresh the session summary if the cadence says it is due.
    ///
    /// Infallible by contract; every failure path logs and returns.
    #[tracing::instrument(name = "refresh_summary", skip_all, fields(session_id = %session_id))]
    pub async fn maybe_refresh<T: TranscriptStore>(
        provider: &BoxLlmProvider,
        transcripts: &T,
        session_id: Uuid,
        settings: &SummarizerSettings,
    ) {
        let count = match transcripts.message_count(&session_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Message count lookup failed; skipping summary");
                return;
            }
        };

        if !Self::is_due(count, settings.every) {
            return;
        }

        let current = match transcripts.get_summary(&session_id).await {
            Ok(summary) => summary.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Summary lookup failed; skipping summary");
                return;
            }
        };

        let recent = match transcripts.recent_messages(&session_id, settings.window).await {
            Ok(messages) if !messages.is_empty() => messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Recent-messages lookup failed; skipping summary");
                return;
            }
        };

        let prompt = Self::build_prompt(&current, &recent, settings.word_limit);

        let request = CompletionRequest {
            model: settings.model.clone(),
            messages: vec![Message::user(prompt)],
            system: None,
            max_tokens: 300,
            temperature: Some(0.3),
            tools: None,
        };

        let new_summary = match provider.complete_with_timeout(&request, settings.timeout).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Summary generation failed; keeping prior summary");
                return;
            }
        };

        if new_summary.is_empty() {
            tracing::warn!("Summary generation returned empty text; keeping prior summary");
            return;
        }

        if let Err(e) = transcripts.set_summary(&session_id, &new_summary).await {
            tracing::warn!(error = %e, "Summary write failed; keeping prior summary");
            return;
        }

        tracing::debug!(words = new_summary.split_whitespace().count(), "Session summary updated");
    }

    fn build_prompt(current_summary: &str, recent: &str, word_limit: usize) -> String {
        let old = if current_summary.is_empty() {
            "No previous summary."
        } else {
            current_summary
        };

        format!(
            r#"You are a memory manager. Update the conversation summary based on new messages.

[OLD SUMMARY]:
{old}

[NEW MESSAGES]:
{recent}

Instructions:
- Output a concise paragraph (max {word_limit} words) capturing the key context
- Include important facts, preferences, and ongoing topics
- Do NOT output a conversational response
- Just output the summary text, nothing else"#
        )
    }
}
