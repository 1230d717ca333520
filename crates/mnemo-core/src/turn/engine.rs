//! TurnEngine: drives a turn through the state machine.
//!
//! Holds the injected provider, tool registry, and store handles, and
//! implements the transition function `step(state, turn) -> (next, turn)`.
//! Each outbound call is a suspension point wrapped in a hard timeout.
//! After the turn completes, the user/assistant exchange is appended to the
//! transcript and the background summarizer is scheduled as a detached
//! task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use mnemo_types::config::MnemoConfig;
use mnemo_types::llm::{CompletionRequest, Message, MessageRole, ToolCall};

use crate::chat::repository::TranscriptStore;
use crate::context::assembler::{AssemblerSettings, ContextAssembler};
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::embedder::Embedder;
use crate::memory::summarizer::{SessionSummarizer, SummarizerSettings};
use crate::memory::vector::VectorStore;
use crate::memory::writer::{MemoryWriter, WriterSettings};
use crate::tool::{self, BoxTool};
use crate::turn::synth::ResponseSynthesizer;
use crate::turn::{Turn, TurnState, next_after_reason};

/// Instruction template for the reasoning step. The two placeholders are
/// filled from the turn's context bundle.
const REASON_SYSTEM_PROMPT: &str = r#"You are Mnemo, a helpful AI assistant with persistent long-term memory and web search capabilities.

[LONG-TERM MEMORY - Facts about the user]
{memory_facts}

[CONVERSATION SUMMARY]
{conversation_summary}

Important facts about yourself:
- You DO have long-term memory that persists across conversations
- You remember important facts about the user and can recall them later
- You CAN and SHOULD search the web when asked about current events, prices, news, or weather

Guidelines:
- Be conversational and helpful
- When asked about your memory, confirm that you DO remember things
- Use the web_search tool for ANY question about current or real-time information
- Be concise but thorough

DO NOT make up data. If asked about current prices, news, or weather, use the web search tool."#;

/// All tuning for one engine instance, distilled from [`MnemoConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub owner_id: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub tool_round_limit: u32,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub facts_limit: usize,
    pub facts_threshold: f32,
    pub summarize_every: u32,
    pub summary_word_limit: usize,
    pub summary_window: i64,
}

impl EngineSettings {
    pub fn from_config(config: &MnemoConfig) -> Self {
        Self {
            owner_id: config.owner_id.0.clone(),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            tool_round_limit: config.agent.tool_round_limit,
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            tool_timeout: Duration::from_secs(config.search.timeout_secs),
            facts_limit: config.agent.facts_limit,
            facts_threshold: config.agent.facts_threshold,
            summarize_every: config.agent.summarize_every,
            summary_word_limit: config.agent.summary_word_limit,
            summary_window: config.agent.summary_window,
        }
    }

    fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            model: self.model.clone(),
            timeout: self.llm_timeout,
        }
    }

    fn summarizer_settings(&self) -> SummarizerSettings {
        SummarizerSettings {
            model: self.model.clone(),
            timeout: self.llm_timeout,
            every: self.summarize_every,
            word_limit: self.summary_word_limit,
            window: self.summary_window,
        }
    }
}

/// The completed turn plus the handle of the detached summarizer task,
/// so one-shot callers can await background work before exiting.
pub struct TurnOutcome {
    pub turn: Turn,
    pub summarizer: Option<JoinHandle<()>>,
}

impl TurnOutcome {
    pub fn response(&self) -> &str {
        &self.turn.final_response
    }
}

/// Drives turns through `Recall -> Reason -> {Tools -> Reason}* -> Respond
/// -> Memorize -> Done`.
pub struct TurnEngine<E, V, T> {
    provider: Arc<BoxLlmProvider>,
    tools: Arc<Vec<BoxTool>>,
    assembler: ContextAssembler<E, V, T>,
    embedder: Arc<E>,
    vectors: Arc<V>,
    transcripts: Arc<T>,
    settings: EngineSettings,
}

impl<E, V, T> TurnEngine<E, V, T>
where
    E: Embedder + 'static,
    V: VectorStore + 'static,
    T: TranscriptStore + 'static,
{
    pub fn new(
        provider: BoxLlmProvider,
        embedder: Arc<E>,
        vectors: Arc<V>,
        transcripts: Arc<T>,
        tools: Vec<BoxTool>,
        settings: EngineSettings,
    ) -> Self {
        let assembler = ContextAssembler::new(
            Arc::clone(&embedder),
            Arc::clone(&vectors),
            Arc::clone(&transcripts),
            AssemblerSettings {
                facts_limit: settings.facts_limit,
                facts_threshold: settings.facts_threshold,
                classify_timeout: settings.llm_timeout,
                model: settings.model.clone(),
            },
        );

        Self {
            provider: Arc::new(provider),
            tools: Arc::new(tools),
            assembler,
            embedder,
            vectors,
            transcripts,
            settings,
        }
    }

    /// Process one user turn to completion.
    #[tracing::instrument(name = "run_turn", skip_all, fields(session_id = ?session_id))]
    pub async fn run(&self, user_input: &str, session_id: Option<Uuid>) -> TurnOutcome {
        let mut turn = Turn::new(user_input, self.settings.owner_id.clone(), session_id);
        let mut state = TurnState::Recall;

        while state != TurnState::Done {
            (state, turn) = self.step(state, turn).await;
        }

        let summarizer = self.finish_turn(&turn).await;

        TurnOutcome { turn, summarizer }
    }

    /// The transition function. Pure with respect to the turn value: every
    /// state returns an updated copy.
    pub async fn step(&self, state: TurnState, turn: Turn) -> (TurnState, Turn) {
        match state {
            TurnState::Recall => {
                let bundle = self
                    .assembler
                    .assemble(&self.provider, &turn.user_input, &turn.owner_id, turn.session_id)
                    .await;
                (TurnState::Reason, turn.with_context(bundle))
            }

            TurnState::Reason => {
                let request = self.build_reason_request(&turn);
                let turn = match self
                    .provider
                    .complete_with_timeout(&request, self.settings.llm_timeout)
                    .await
                {
                    Ok(response) => turn.with_message(Message::assistant_with_calls(
                        response.content,
                        response.tool_calls,
                    )),
                    Err(e) => {
                        tracing::warn!(error = %e, "Reasoning call failed");
                        turn
                    }
                };
                (
                    next_after_reason(&turn, self.settings.tool_round_limit),
                    turn,
                )
            }

            TurnState::Tools => {
                let calls: Vec<ToolCall> = turn
                    .last_message()
                    .map(|m| m.tool_calls.clone())
                    .unwrap_or_default();

                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    let content = self.execute_tool(call).await;
                    results.push(Message::tool_result(call.id.clone(), content));
                }

                tracing::debug!(
                    executed = results.len(),
                    round = turn.tool_rounds + 1,
                    "Tool round complete"
                );

                (TurnState::Reason, turn.with_messages(results).with_tool_round())
            }

            TurnState::Respond => {
                let response = ResponseSynthesizer::synthesize(
                    &self.provider,
                    &self.settings.model,
                    &turn.messages,
                    &turn.user_input,
                    self.settings.max_tokens,
                    self.settings.llm_timeout,
                )
                .await;
                (TurnState::Memorize, turn.with_response(response))
            }

            TurnState::Memorize => {
                MemoryWriter::memorize(
                    &self.provider,
                    self.embedder.as_ref(),
                    self.vectors.as_ref(),
                    &turn.owner_id,
                    turn.session_id,
                    &turn.user_input,
                    &turn.final_response,
                    &self.settings.writer_settings(),
                )
                .await;
                (TurnState::Done, turn)
            }

            TurnState::Done => (TurnState::Done, turn),
        }
    }

    /// Persist the exchange and schedule the detached summarizer task.
    ///
    /// Transcript write failures are logged and dropped: the response has
    /// already been produced.
    async fn finish_turn(&self, turn: &Turn) -> Option<JoinHandle<()>> {
        let session_id = turn.session_id?;

        if let Err(e) = self
            .transcripts
            .append_message(&session_id, MessageRole::User, &turn.user_input)
            .await
        {
            tracing::warn!(error = %e, "Failed to persist user message");
        }
        if !turn.final_response.is_empty()
            && let Err(e) = self
                .transcripts
                .append_message(&session_id, MessageRole::Assistant, &turn.final_response)
                .await
        {
            tracing::warn!(error = %e, "Failed to persist assistant message");
        }

        let provider = Arc::clone(&self.provider);
        let transcripts = Arc::clone(&self.transcripts);
        let settings = self.settings.summarizer_settings();
        Some(tokio::spawn(async move {
            SessionSummarizer::maybe_refresh(&provider, transcripts.as_ref(), session_id, &settings)
                .await;
        }))
    }

    /// Execute one requested tool call, always producing result text so the
    /// causal call/result pairing in the message log stays intact.
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            return format!("Tool '{}' is not available.", call.name);
        };

        let query = tool::query_argument(&call.arguments);

        match tokio::time::timeout(self.settings.tool_timeout, tool.invoke(&query)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Tool call failed: {e}")
            }
            Err(_) => {
                tracing::warn!(tool = %call.name, "Tool call timed out");
                format!("Tool '{}' timed out.", call.name)
            }
        }
    }

    /// Build the reasoning request: instruction template + context bundle +
    /// current message sequence, with tool definitions bound.
    fn build_reason_request(&self, turn: &Turn) -> CompletionRequest {
        let bundle = turn.context.clone().unwrap_or_default();

        let facts = if bundle.facts.is_empty() {
            "No prior facts."
        } else {
            &bundle.facts
        };
        let summary = if bundle.summary.is_empty() {
            "No summary yet."
        } else {
            &bundle.summary
        };

        let system = REASON_SYSTEM_PROMPT
            .replace("{memory_facts}", facts)
            .replace("{conversation_summary}", summary);

        let mut messages = Vec::with_capacity(turn.messages.len() + 1);
        if !bundle.recent.is_empty() {
            messages.push(Message::system(format!(
                "RECENT CONVERSATION HISTORY (from the transcript):\n{}",
                bundle.recent
            )));
        }
        messages.extend(turn.messages.iter().cloned());

        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(tool::definitions(&self.tools))
        };

        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            system: Some(system),
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LlmProvider;
    use crate::tool::Tool;
    use crate::turn::synth::APOLOGY;
    use chrono::Utc;
    use mnemo_types::chat::{SessionRecord, StoredMessage};
    use mnemo_types::context::QueryIntent;
    use mnemo_types::error::{RepositoryError, ToolError};
    use mnemo_types::llm::{CompletionResponse, LlmError, StopReason, Usage};
    use mnemo_types::memory::{MemoryFilter, MemoryKind, MemoryPoint, ScoredMemory};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- Scripted fakes ---------------------------------------------------

    enum Reply {
        Text(&'static str),
        Calls(Vec<ToolCall>),
        Fail,
    }

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Reply>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted provider ran out of replies");
            match reply {
                Reply::Text(text) => Ok(CompletionResponse {
                    id: "resp".to_string(),
                    content: text.to_string(),
                    model: request.model.clone(),
                    stop_reason: StopReason::EndTurn,
                    tool_calls: vec![],
                    usage: Usage::default(),
                }),
                Reply::Calls(calls) => Ok(CompletionResponse {
                    id: "resp".to_string(),
                    content: String::new(),
                    model: request.model.clone(),
                    stop_reason: StopReason::ToolUse,
                    tool_calls: calls,
                    usage: Usage::default(),
                }),
                Reply::Fail => Err(LlmError::Provider {
                    message: "scripted failure".to_string(),
                }),
            }
        }
    }

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }

        fn model_name(&self) -> &str {
            "fixed"
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

    /// A transcript store that remembers nothing; turns here run without a
    /// session.
    struct NullTranscripts;

    impl TranscriptStore for NullTranscripts {
        async fn create_session(
            &self,
            owner_id: &str,
            title: Option<String>,
        ) -> Result<SessionRecord, RepositoryError> {
            Ok(SessionRecord {
                id: Uuid::now_v7(),
                owner_id: owner_id.to_string(),
                title,
                summary: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        }

        async fn get_session(
            &self,
            _session_id: &Uuid,
        ) -> Result<Option<SessionRecord>, RepositoryError> {
            Ok(None)
        }

        async fn list_sessions(
            &self,
            _owner_id: &str,
        ) -> Result<Vec<SessionRecord>, RepositoryError> {
            Ok(vec![])
        }

        async fn delete_session(&self, _session_id: &Uuid) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn append_message(
            &self,
            session_id: &Uuid,
            role: MessageRole,
            content: &str,
        ) -> Result<StoredMessage, RepositoryError> {
            Ok(StoredMessage {
                id: Uuid::now_v7(),
                session_id: *session_id,
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            })
        }

        async fn recent_messages(
            &self,
            _session_id: &Uuid,
            _limit: i64,
        ) -> Result<Vec<StoredMessage>, RepositoryError> {
            Ok(vec![])
        }

        async fn message_count(&self, _session_id: &Uuid) -> Result<u64, RepositoryError> {
            Ok(0)
        }

        async fn get_summary(&self, _session_id: &Uuid) -> Result<Option<String>, RepositoryError> {
            Ok(None)
        }

        async fn set_summary(
            &self,
            _session_id: &Uuid,
            _summary: &str,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn search_sessions(
            &self,
            _owner_id: &str,
            _query: &str,
        ) -> Result<Vec<SessionRecord>, RepositoryError> {
            Ok(vec![])
        }

        async fn session_count(&self) -> Result<u64, RepositoryError> {
            Ok(0)
        }

        async fn total_message_count(&self) -> Result<u64, RepositoryError> {
            Ok(0)
        }

        async fn checkpoint(&self) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct CountingSearchTool {
        invocations: Arc<AtomicUsize>,
    }

    impl Tool for CountingSearchTool {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "Search the web for current information"
        }

        async fn invoke(&self, query: &str) -> Result<String, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(format!("SOURCE data for '{query}'"))
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            owner_id: "default_user".to_string(),
            model: "test-model".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            tool_round_limit: 3,
            llm_timeout: Duration::from_secs(5),
            tool_timeout: Duration::from_secs(5),
            facts_limit: 5,
            facts_threshold: 0.5,
            summarize_every: 5,
            summary_word_limit: 150,
            summary_window: 20,
        }
    }

    fn engine_with(
        replies: Vec<Reply>,
        tools: Vec<BoxTool>,
    ) -> (TurnEngine<FixedEmbedder, RecordingStore, NullTranscripts>, Arc<RecordingStore>) {
        let vectors = Arc::new(RecordingStore::default());
        let engine = TurnEngine::new(
            BoxLlmProvider::new(ScriptedProvider::new(replies)),
            Arc::new(FixedEmbedder),
            Arc::clone(&vectors),
            Arc::new(NullTranscripts),
            tools,
            settings(),
        );
        (engine, vectors)
    }

    fn search_call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "web_search".to_string(),
            arguments: serde_json::json!({"query": "weather in Paris"}),
        }
    }

    // -- End-to-end scenarios ---------------------------------------------

    #[tokio::test]
    async fn test_weather_turn_with_one_tool_round() {
        // Call order: classify, reason (tool call), reason (final text),
        // fact extraction.
        let invocations = Arc::new(AtomicUsize::new(0));
        let (engine, vectors) = engine_with(
            vec![
                Reply::Text(r#"{"intent": "new_topic", "needs_history": false}"#),
                Reply::Calls(vec![search_call("c1")]),
                Reply::Text("It's 18C and partly cloudy in Paris."),
                Reply::Text("User asked about the weather in Paris"),
            ],
            vec![BoxTool::new(CountingSearchTool {
                invocations: Arc::clone(&invocations),
            })],
        );

        let outcome = engine.run("What's the weather in Paris?", None).await;

        assert_eq!(outcome.response(), "It's 18C and partly cloudy in Paris.");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.turn.tool_rounds, 1);

        // new_topic: facts only, no summary/recent
        let bundle = outcome.turn.context.as_ref().unwrap();
        assert_eq!(bundle.intent, QueryIntent::NewTopic);
        assert!(bundle.summary.is_empty());
        assert!(bundle.recent.is_empty());

        // Memory writer stored an extracted fact
        let points = vectors.upserts.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload.kind, MemoryKind::ExtractedFact);

        assert!(outcome.summarizer.is_none(), "no session, no summarizer");
    }

    #[tokio::test]
    async fn test_classifier_failure_still_produces_bundle() {
        // Classify fails outright; reason answers in text; extraction NONE.
        let (engine, vectors) = engine_with(
            vec![
                Reply::Fail,
                Reply::Text("Hello! How can I help?"),
                Reply::Text("NONE"),
            ],
            vec![],
        );

        let outcome = engine.run("hi there", None).await;

        let bundle = outcome.turn.context.as_ref().unwrap();
        assert_eq!(bundle.intent, QueryIntent::General);
        assert!(bundle.summary.is_empty());
        assert!(bundle.recent.is_empty());
        assert_eq!(outcome.response(), "Hello! How can I help?");

        // NONE sentinel means the transcript fallback was stored
        let points = vectors.upserts.lock().unwrap();
        assert_eq!(points[0].payload.kind, MemoryKind::TranscriptFallback);
    }

    #[tokio::test]
    async fn test_fourth_tool_request_is_refused() {
        // The model requests a tool on every reasoning call. Rounds 1-3 run;
        // the 4th request is refused by the guard and the synthesizer runs
        // against the accumulated tool output.
        let invocations = Arc::new(AtomicUsize::new(0));
        let (engine, _vectors) = engine_with(
            vec![
                Reply::Text(r#"{"intent": "general", "needs_history": true}"#),
                Reply::Calls(vec![search_call("c1")]),
                Reply::Calls(vec![search_call("c2")]),
                Reply::Calls(vec![search_call("c3")]),
                Reply::Calls(vec![search_call("c4")]),
                Reply::Text("Synthesized from partial results."),
                Reply::Text("NONE"),
            ],
            vec![BoxTool::new(CountingSearchTool {
                invocations: Arc::clone(&invocations),
            })],
        );

        let outcome = engine.run("keep searching", None).await;

        assert_eq!(outcome.turn.tool_rounds, 3, "counter stops at the bound");
        assert_eq!(invocations.load(Ordering::SeqCst), 3, "4th call refused");
        assert_eq!(outcome.response(), "Synthesized from partial results.");
    }

    #[tokio::test]
    async fn test_reason_failure_collapses_to_apology() {
        // Call order: classify, reason (fails), then fact extraction of the
        // apology exchange.
        let (engine, _vectors) = engine_with(
            vec![
                Reply::Text(r#"{"intent": "general", "needs_history": true}"#),
                Reply::Fail,
                Reply::Text("NONE"),
            ],
            vec![],
        );

        let outcome = engine.run("hello", None).await;
        assert_eq!(outcome.response(), APOLOGY);
    }

    #[tokio::test]
    async fn test_unknown_tool_still_gets_result_message() {
        let (engine, _vectors) = engine_with(
            vec![
                Reply::Text(r#"{"intent": "general", "needs_history": true}"#),
                Reply::Calls(vec![ToolCall {
                    id: "c1".to_string(),
                    name: "crystal_ball".to_string(),
                    arguments: serde_json::json!({"query": "future"}),
                }]),
                Reply::Text("I can't see the future."),
                Reply::Text("NONE"),
            ],
            vec![],
        );

        let outcome = engine.run("tell my fortune", None).await;

        // The tool result message for the unknown tool must exist and be
        // causally paired with the call.
        let tool_msgs: Vec<_> = outcome
            .turn
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 1);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("c1"));
        assert!(tool_msgs[0].content.contains("not available"));
        assert_eq!(outcome.response(), "I can't see the future.");
    }
}
