//! LlmProvider trait definition.
//!
//! The chat-completion boundary: a role-tagged message list plus optional
//! tool schemas in, text content and/or requested tool invocations out.
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).
//! Implementations live in mnemo-infra.

use mnemo_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
