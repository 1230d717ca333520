//! Tool contract for the reasoning loop.
//!
//! A tool is a named function taking a single string query and returning
//! formatted text. Tools are bound to the reasoning step as JSON schemas
//! and executed by the `Tools` state of the turn machine.
//!
//! Follows the same RPITIT + boxed-dyn pattern as `LlmProvider`.

use std::future::Future;
use std::pin::Pin;

use mnemo_types::error::ToolError;
use mnemo_types::llm::ToolDefinition;

/// Trait for agent tools.
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the model (e.g., "web_search").
    fn name(&self) -> &str;

    /// One-paragraph description shown to the model.
    fn description(&self) -> &str;

    /// Execute the tool against a single string query.
    fn invoke(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<String, ToolError>> + Send;
}

/// Object-safe version of [`Tool`] with boxed futures.
pub trait ToolDyn: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn invoke_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;
}

impl<T: Tool> ToolDyn for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn description(&self) -> &str {
        Tool::description(self)
    }

    fn invoke_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>> {
        Box::pin(self.invoke(query))
    }
}

/// Type-erased tool for registration in the turn engine.
pub struct BoxTool {
    inner: Box<dyn ToolDyn + Send + Sync>,
}

impl BoxTool {
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        Self {
            inner: Box::new(tool),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        self.inner.invoke_boxed(query).await
    }

    /// The JSON schema bound to completion requests for this tool.
    ///
    /// Every tool takes a single required string argument named `query`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The query string for this tool"
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

/// Build the tool schema list for a completion request.
pub fn definitions(tools: &[BoxTool]) -> Vec<ToolDefinition> {
    tools.iter().map(|t| t.definition()).collect()
}

/// Extract the `query` argument from a tool call's arguments object.
///
/// The model occasionally emits a bare string instead of an object; both
/// shapes are accepted.
pub fn query_argument(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
