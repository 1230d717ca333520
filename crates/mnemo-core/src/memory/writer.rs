//! The memory write path: fact extraction, embedding, storage.
//!
//! After a turn responds, the writer distills one durable fact from the
//! exchange (or falls back to the raw transcript pair), embeds it, and
//! upserts a memory point. Every failure here is caught and logged; the
//! response has already been delivered, so nothing may propagate.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use mnemo_types::llm::{CompletionRequest, Message};
use mnemo_types::memory::{MemoryKind, MemoryPayload, MemoryPoint};

use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::embedder::Embedder;
use crate::memory::vector::VectorStore;

/// Sentinel the extraction model emits when nothing is worth keeping.
const NO_FACT_SENTINEL: &str = "NONE";

/// Prompt for the fact-extraction call.
const EXTRACTION_SYSTEM_PROMPT: &str = r#"Extract the most important fact from the conversation exchange you are given.

Rules:
- Extract only factual information: preferences, decisions, facts about the user
- Output a single concise sentence and nothing else
- If there is no important fact, output exactly: NONE
- Good examples: "User prefers dark mode", "User is working on a React project"
- Do NOT extract conversational filler like "thanks" or "ok""#;

/// Settings for one memory write.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    pub model: String,
    pub timeout: Duration,
}

/// Stateless utility persisting one memory per completed turn.
pub struct MemoryWriter;

impl MemoryWriter {
    /// Persist a memory of the completed exchange.
    ///
    /// Skipped when either side of the exchange is empty. Infallible by
    /// contract: a missed memory write is recoverable, not fatal.
    #[tracing::instrument(name = "memorize", skip_all, fields(owner_id = %owner_id))]
    pub async fn memorize<E, V>(
        provider: &BoxLlmProvider,
        embedder: &E,
        vectors: &V,
        owner_id: &str,
        session_id: Option<Uuid>,
        user_input: &str,
        response: &str,
        settings: &WriterSettings,
    ) where
        E: Embedder,
        V: VectorStore,
    {
        if user_input.trim().is_empty() || response.trim().is_empty() {
            return;
        }

        let (text, kind) =
            match Self::extract_fact(provider, user_input, response, settings).await {
                Some(fact) => (fact, MemoryKind::ExtractedFact),
                None => (
                    Self::fallback_text(user_input, response),
                    MemoryKind::TranscriptFallback,
                ),
            };

        let embedding = match embedder.embed(&[text.clone()]).await {
            Ok(mut vecs) if !vecs.is_empty() => vecs.remove(0),
            Ok(_) => {
                tracing::warn!("Embedder returned no vector; dropping memory write");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed; dropping memory write");
                return;
            }
        };

        let point = MemoryPoint {
            id: Uuid::now_v7(),
            vector: embedding,
            payload: MemoryPayload {
                owner_id: owner_id.to_string(),
                session_id,
                text,
                kind,
                created_at: Utc::now(),
            },
        };

        match vectors.upsert(std::slice::from_ref(&point)).await {
            Ok(()) => {
                tracing::debug!(memory_id = %point.id, kind = %kind, "Memory saved");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Memory upsert failed; write dropped");
            }
        }
    }

    /// Ask the LLM for one factual sentence; None on failure or the
    /// no-fact sentinel.
    async fn extract_fact(
        provider: &BoxLlmProvider,
        user_input: &str,
        response: &str,
        settings: &WriterSettings,
    ) -> Option<String> {
        let exchange = format!("USER: {user_input}\nASSISTANT: {response}");

        let request = CompletionRequest {
            model: settings.model.clone(),
            messages: vec![Message::user(exchange)],
            system: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            max_tokens: 100,
            temperature: Some(0.2),
            tools: None,
        };

        let completion = match provider.complete_with_timeout(&request, settings.timeout).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(error = %e, "Fact extraction failed; falling back to transcript");
                return None;
            }
        };

        let fact = completion.content.trim().to_string();
        if fact.is_empty() || Self::is_no_fact(&fact) {
            return None;
        }

        Some(fact)
    }

    fn is_no_fact(fact: &str) -> bool {
        fact.trim().eq_ignore_ascii_case(NO_FACT_SENTINEL)
    }

    /// The transcript pair stored when extraction yields nothing.
    pub fn fallback_text(user_input: &str, response: &str) -> String {
        format!("User said: {user_input}\nAssistant responded: {response}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LlmProvider;
    use mnemo_types::error::RepositoryError;
    use mnemo_types::llm::{CompletionResponse, LlmError, StopReason, Usage};
    use mnemo_types::memory::{MemoryFilter, ScoredMemory};
    use std::sync::Mutex;

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

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
            Err(RepositoryError::Query("embedder down".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        upserts: Mutex<Vec<MemoryPoint>>,
    }

    impl VectorStore for RecordingStore {
        async fn upsert(&self, points: &[MemoryPoint]) -> Result<(), RepositoryError> {
            self.upserts.lock().unwrap().extend_from_slice(points);
            Ok(())
        }

        async fn search(
            &self,
            _query_vector: &[f32],
            _filter: &MemoryFilter,
            _limit: usize,
        ) -> Result<Vec<ScoredMemory>, RepositoryError> {
            Ok(vec![])
        }

        async fn scroll(
            &self,
            _filter: &MemoryFilter,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<MemoryPoint>, RepositoryError> {
            Ok(vec![])
        }

        async fn delete(&self, _ids: &[Uuid]) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn delete_by_filter(&self, _filter: &MemoryFilter) -> Result<u64, RepositoryError> {
            Ok(0)
        }

        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.upserts.lock().unwrap().len() as u64)
        }

        async fn recreate(&self, _dimension: usize) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn settings() -> WriterSettings {
        WriterSettings {
            model: "m".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_extracted_fact_is_stored_tagged() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "User prefers dark mode".to_string(),
        });
        let store = RecordingStore::default();

        MemoryWriter::memorize(
            &provider,
            &FixedEmbedder,
            &store,
            "alice",
            None,
            "I like dark mode",
            "Noted, dark mode it is",
            &settings(),
        )
        .await;

        let points = store.upserts.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload.kind, MemoryKind::ExtractedFact);
        assert_eq!(points[0].payload.text, "User prefers dark mode");
        assert_eq!(points[0].payload.owner_id, "alice");
    }

    #[tokio::test]
    async fn test_no_fact_sentinel_stores_transcript_fallback() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "NONE".to_string(),
        });
        let store = RecordingStore::default();

        MemoryWriter::memorize(
            &provider,
            &FixedEmbedder,
            &store,
            "alice",
            None,
            "thanks!",
            "You're welcome!",
            &settings(),
        )
        .await;

        let points = store.upserts.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload.kind, MemoryKind::TranscriptFallback);
        assert_eq!(
            points[0].payload.text,
            "User said: thanks!\nAssistant responded: You're welcome!"
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_silently() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "User likes cats".to_string(),
        });
        let store = RecordingStore::default();

        MemoryWriter::memorize(
            &provider,
            &FailingEmbedder,
            &store,
            "alice",
            None,
            "I like cats",
            "Cats are great",
            &settings(),
        )
        .await;

        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_exchange_is_skipped() {
        let provider = BoxLlmProvider::new(CannedProvider {
            content: "should not matter".to_string(),
        });
        let store = RecordingStore::default();

        MemoryWriter::memorize(
            &provider,
            &FixedEmbedder,
            &store,
            "alice",
            None,
            "",
            "some response",
            &settings(),
        )
        .await;

        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_is_no_fact_case_insensitive() {
        assert!(MemoryWriter::is_no_fact("NONE"));
        assert!(MemoryWriter::is_no_fact("none"));
        assert!(MemoryWriter::is_no_fact(" None "));
        assert!(!MemoryWriter::is_no_fact("User likes None (the movie)"));
    }

    #[test]
    fn test_extraction_prompt_contains_sentinel() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("NONE"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("single concise sentence"));
    }
}
