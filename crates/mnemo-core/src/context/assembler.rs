//! Context assembler: intent-keyed three-tier retrieval.
//!
//! Facts are always fetched -- the similarity search makes them
//! query-relevant by construction. The summary and recent-window tiers are
//! included per a deterministic policy keyed on the classified intent.
//! Every tier lookup failure degrades to an empty string for that tier and
//! is logged, never raised.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use mnemo_types::context::{ContextBundle, IntentDecision, QueryIntent};
use mnemo_types::memory::MemoryFilter;

use crate::chat::repository::TranscriptStore;
use crate::context::intent::IntentClassifier;
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::embedder::Embedder;
use crate::memory::vector::VectorStore;

/// Which optional tiers to include for a classified intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPlan {
    pub include_summary: bool,
    /// Recent-window size in messages; 0 means no recent tier.
    pub recent_limit: i64,
}

/// The deterministic tier policy.
///
/// `factual` queries never include the recent window: the remembered fact
/// lives in the vector store or the summary, and raw transcript noise is
/// more likely to mislead the model than help it.
pub fn tier_plan(decision: IntentDecision) -> TierPlan {
    match decision.intent {
        QueryIntent::Overview => TierPlan {
            include_summary: true,
            recent_limit: 2,
        },
        QueryIntent::Followup => TierPlan {
            include_summary: false,
            recent_limit: 5,
        },
        QueryIntent::Factual => TierPlan {
            include_summary: decision.needs_history,
            recent_limit: 0,
        },
        QueryIntent::NewTopic => TierPlan {
            include_summary: false,
            recent_limit: 0,
        },
        QueryIntent::General => TierPlan {
            include_summary: true,
            recent_limit: 3,
        },
    }
}

/// Tuning knobs for the facts tier.
#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    pub facts_limit: usize,
    /// Minimum cosine similarity for a fact to be included.
    pub facts_threshold: f32,
    /// Timeout for the classification LLM call.
    pub classify_timeout: Duration,
    /// Model used for the classification call.
    pub model: String,
}

/// Assembles the per-turn context bundle from the three memory tiers.
pub struct ContextAssembler<E, V, T> {
    embedder: Arc<E>,
    vectors: Arc<V>,
    transcripts: Arc<T>,
    settings: AssemblerSettings,
}

impl<E, V, T> ContextAssembler<E, V, T>
where
    E: Embedder,
    V: VectorStore,
    T: TranscriptStore,
{
    pub fn new(
        embedder: Arc<E>,
        vectors: Arc<V>,
        transcripts: Arc<T>,
        settings: AssemblerSettings,
    ) -> Self {
        Self {
            embedder,
            vectors,
            transcripts,
            settings,
        }
    }

    /// Classify the query and assemble the context bundle for one turn.
    ///
    /// Infallible: a turn always gets a bundle, possibly with empty tiers.
    #[tracing::instrument(name = "assemble_context", skip_all, fields(owner_id = %owner_id))]
    pub async fn assemble(
        &self,
        provider: &BoxLlmProvider,
        query: &str,
        owner_id: &str,
        session_id: Option<Uuid>,
    ) -> ContextBundle {
        let decision = IntentClassifier::classify(
            provider,
            &self.settings.model,
            query,
            self.settings.classify_timeout,
        )
        .await;
        let plan = tier_plan(decision);

        let facts = self.fetch_facts(query, owner_id).await;

        let summary = if plan.include_summary {
            self.fetch_summary(session_id).await
        } else {
            String::new()
        };

        let recent = if plan.recent_limit > 0 {
            self.fetch_recent(session_id, plan.recent_limit).await
        } else {
            String::new()
        };

        tracing::debug!(
            intent = %decision.intent,
            facts_len = facts.len(),
            summary_len = summary.len(),
            recent_len = recent.len(),
            "Context bundle assembled"
        );

        ContextBundle {
            facts,
            summary,
            recent,
            intent: decision.intent,
        }
    }

    /// Tier 2: embed the query and run an owner-scoped similarity search,
    /// keeping only hits above the relevance threshold.
    async fn fetch_facts(&self, query: &str, owner_id: &str) -> String {
        let embedding = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return String::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed; skipping facts tier");
                return String::new();
            }
        };

        let filter = MemoryFilter::owner(owner_id);
        let hits = match self
            .vectors
            .search(&embedding, &filter, self.settings.facts_limit)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Memory search failed; skipping facts tier");
                return String::new();
            }
        };

        let relevant: Vec<String> = hits
            .iter()
            .filter(|hit| hit.score > self.settings.facts_threshold)
            .map(|hit| format!("- {}", hit.payload.text))
            .collect();

        if relevant.is_empty() {
            return String::new();
        }

        format!(
            "Here is what you remember about this user:\n{}",
            relevant.join("\n")
        )
    }

    /// Tier 3: the session's rolling summary.
    async fn fetch_summary(&self, session_id: Option<Uuid>) -> String {
        let Some(session_id) = session_id else {
            return String::new();
        };

        match self.transcripts.get_summary(&session_id).await {
            Ok(Some(summary)) => summary,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Summary lookup failed; skipping summary tier");
                String::new()
            }
        }
    }

    /// Tier 1: the last `limit` messages, rendered as role-tagged lines.
    async fn fetch_recent(&self, session_id: Option<Uuid>, limit: i64) -> String {
        let Some(session_id) = session_id else {
            return String::new();
        };

        match self.transcripts.recent_messages(&session_id, limit).await {
            Ok(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                tracing::warn!(error = %e, "Recent-messages lookup failed; skipping recent tier");
                String::new()
            }
        }
    }
}
