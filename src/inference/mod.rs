pub mod openai;
pub mod retry;

use async_trait::async_trait;

use crate::types::ContextAnalysis;

/// A normalized tool invocation decoded from a model response.
///
/// Providers hand back tool calls in more than one wire shape; everything
/// is converted to this form at the inference boundary so the rest of the
/// system only ever sees `{name, arguments}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    /// Accepts either an OpenAI `tool_calls` entry
    /// (`{"function": {"name": ..., "arguments": "<json string>"}}`) or a
    /// bare `{"name": ..., "arguments": {...}}` object.
    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        let (name, raw_args) = if let Some(function) = value.get("function") {
            (function.get("name")?, function.get("arguments")?)
        } else {
            (value.get("name")?, value.get("arguments")?)
        };

        let name = name.as_str()?.to_string();
        let arguments = match raw_args {
            // OpenAI serializes arguments as a JSON string.
            serde_json::Value::String(s) => serde_json::from_str(s).ok()?,
            other => other.clone(),
        };

        Some(Self { name, arguments })
    }
}

/// Contract with the external inference service.
///
/// Implementations own their retry/timeout behavior; callers only decide
/// what a failure means for the current turn.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Free-text generation over an ordered message payload.
    async fn generate(&self, messages: &[serde_json::Value]) -> anyhow::Result<String>;

    /// Forced structured-output call returning the companion model's
    /// context analysis: summary, fact references, extracted facts, and
    /// the reorganisation plan, in one call.
    async fn analyze(&self, messages: &[serde_json::Value]) -> anyhow::Result<ContextAnalysis>;

    /// Condense formatted conversation lines into a short summary.
    async fn summarize(&self, lines: &[String]) -> anyhow::Result<String>;
}
