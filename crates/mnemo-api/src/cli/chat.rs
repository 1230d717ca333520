//! One-shot chat command.

use anyhow::Context;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use mnemo_core::chat::repository::TranscriptStore;
use mnemo_core::llm::box_provider::BoxLlmProvider;
use mnemo_core::tool::BoxTool;
use mnemo_core::turn::engine::{EngineSettings, TurnEngine};
use mnemo_infra::embed::OpenAiCompatEmbedder;
use mnemo_infra::llm::openai_compat::OpenAiCompatProvider;
use mnemo_infra::search::WebSearchTool;

use crate::state::AppState;

/// Run one turn through the agent and print the response.
///
/// Starts a new session unless `--session` names an existing one. The
/// detached summarizer task is awaited before exit so a one-shot process
/// doesn't drop it.
pub async fn run_chat(
    state: &AppState,
    message: &str,
    session: Option<Uuid>,
    json: bool,
) -> anyhow::Result<()> {
    let config = &state.config;

    let session_id = match session {
        Some(id) => {
            state
                .transcripts
                .get_session(&id)
                .await?
                .with_context(|| format!("session {id} not found"))?;
            id
        }
        None => {
            state
                .transcripts
                .create_session(&config.owner_id.0, None)
                .await?
                .id
        }
    };

    let provider = BoxLlmProvider::new(OpenAiCompatProvider::new(
        config.llm.base_url.clone(),
        SecretString::from(config.llm.api_key.clone()),
    ));

    let embedder = Arc::new(OpenAiCompatEmbedder::new(
        config.embedding.base_url.clone(),
        SecretString::from(config.embedding.api_key.clone()),
        config.embedding.model.clone(),
        config.embedding.dimension,
        Duration::from_secs(config.embedding.timeout_secs),
    ));

    let tools = vec![BoxTool::new(WebSearchTool::new(&config.search))];

    let engine = TurnEngine::new(
        provider,
        embedder,
        Arc::clone(&state.vectors),
        Arc::clone(&state.transcripts),
        tools,
        EngineSettings::from_config(config),
    );

    let outcome = engine.run(message, Some(session_id)).await;

    if json {
        let payload = serde_json::json!({
            "session_id": session_id,
            "response": outcome.response(),
            "intent": outcome.turn.context.as_ref().map(|c| c.intent),
            "tool_rounds": outcome.turn.tool_rounds,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", outcome.response());
        println!();
        println!("  session: {session_id}");
    }

    // One-shot process: let the background summary land before exit.
    if let Some(handle) = outcome.summarizer {
        let _ = handle.await;
    }

    Ok(())
}
