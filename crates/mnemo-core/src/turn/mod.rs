//! The turn-processing state machine.
//!
//! A turn moves through `Recall -> Reason -> {Tools -> Reason}* -> Respond
//! -> Memorize -> Done`. The machine is an explicit tagged-state enum with
//! a transition function; each state returns an updated copy of the turn
//! value, so intermediate states are reproducible from the message log and
//! no state is mutated in place while a concurrent turn might read it.

pub mod engine;
pub mod synth;

use uuid::Uuid;

use mnemo_types::context::ContextBundle;
use mnemo_types::llm::Message;

/// States of the turn machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Fetch the adaptive context bundle. Runs exactly once per turn.
    Recall,
    /// Invoke the LLM with tools bound; may request tool calls.
    Reason,
    /// Execute every requested tool call, then return to Reason.
    Tools,
    /// Produce the final response text.
    Respond,
    /// Persist a durable memory of the completed exchange.
    Memorize,
    Done,
}

/// One user request moving through the machine.
///
/// Nothing about a Turn is itself durable; the memory writer and transcript
/// store decide what to persist.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_input: String,
    pub owner_id: String,
    pub session_id: Option<Uuid>,
    /// Accumulated message sequence, starting with the user input.
    pub messages: Vec<Message>,
    /// Set once by Recall; never replaced afterwards.
    pub context: Option<ContextBundle>,
    /// Completed reason->tools round trips (one per loop iteration, not
    /// one per tool call).
    pub tool_rounds: u32,
    pub final_response: String,
}

impl Turn {
    pub fn new(user_input: impl Into<String>, owner_id: impl Into<String>, session_id: Option<Uuid>) -> Self {
        let user_input = user_input.into();
        Self {
            messages: vec![Message::user(user_input.clone())],
            user_input,
            owner_id: owner_id.into(),
            session_id,
            context: None,
            tool_rounds: 0,
            final_response: String::new(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Copy-on-write field updates.
    pub fn with_context(self, context: ContextBundle) -> Self {
        Self {
            context: Some(context),
            ..self
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_tool_round(self) -> Self {
        Self {
            tool_rounds: self.tool_rounds + 1,
            ..self
        }
    }

    pub fn with_response(self, response: String) -> Self {
        Self {
            final_response: response,
            ..self
        }
    }
}

/// The guard deciding the edge out of `Reason`.
///
/// Transition to `Tools` only when the last assistant message carries tool
/// calls and the round counter is below the bound. Exceeding the bound
/// forces `Respond` even if the model still requested a tool; that event is
/// logged distinctly from a normal tool-less completion.
pub fn next_after_reason(turn: &Turn, tool_round_limit: u32) -> TurnState {
    let Some(last) = turn.last_message() else {
        return TurnState::Respond;
    };

    if !last.has_tool_calls() {
        return TurnState::Respond;
    }

    if turn.tool_rounds >= tool_round_limit {
        tracing::warn!(
            tool_rounds = turn.tool_rounds,
            limit = tool_round_limit,
            "Tool-call bound reached with a pending tool request; forcing respond"
        );
        return TurnState::Respond;
    }

    TurnState::Tools
}
