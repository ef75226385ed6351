use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::retry::RetryPolicy;
use super::{InferenceProvider, ToolInvocation};
use crate::config::ProviderConfig;
use crate::types::ContextAnalysis;

/// Hard ceiling on any single inference call. Failing fast and falling
/// back to an apologetic reply beats hanging a user-facing interaction.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const ANALYSIS_TOOL_NAME: &str = "process_context_for_summary";

/// OpenAI-compatible chat-completions client. One instance serves all
/// three call kinds (generation, context analysis, summarization), each
/// pinned to its configured model.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    analysis_model: String,
    summary_model: String,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("provider.api_key is not configured")?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            analysis_model: config.analysis_model.clone(),
            summary_model: config.summary_model.clone(),
            retry,
        })
    }

    async fn chat(&self, label: &str, body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/chat/completions", self.base_url);
        self.retry
            .run(label, || async {
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(body)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("chat completion failed: {status}: {text}");
                }

                let value: serde_json::Value = response.json().await?;
                Ok(value)
            })
            .await
    }
}

#[async_trait]
impl InferenceProvider for OpenAiProvider {
    async fn generate(&self, messages: &[serde_json::Value]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
        });
        let response = self.chat("generate", &body).await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .context("generation response carried no content")?;
        debug!(model = %self.model, chars = content.len(), "generation completed");
        Ok(content.trim().to_string())
    }

    async fn analyze(&self, messages: &[serde_json::Value]) -> anyhow::Result<ContextAnalysis> {
        let body = json!({
            "model": self.analysis_model,
            "messages": messages,
            "tools": [analysis_tool()],
            "tool_choice": {
                "type": "function",
                "function": {"name": ANALYSIS_TOOL_NAME},
            },
        });
        let response = self.chat("analyze", &body).await?;

        let tool_call = response["choices"][0]["message"]["tool_calls"]
            .get(0)
            .context("analysis response carried no tool call")?;
        let invocation = ToolInvocation::from_wire(tool_call)
            .context("analysis tool call did not match any supported wire shape")?;
        if invocation.name != ANALYSIS_TOOL_NAME {
            anyhow::bail!("analysis model called unexpected tool: {}", invocation.name);
        }

        let analysis: ContextAnalysis = serde_json::from_value(invocation.arguments)
            .context("analysis tool arguments did not match the declared schema")?;
        Ok(analysis)
    }

    async fn summarize(&self, lines: &[String]) -> anyhow::Result<String> {
        let conversation: String = lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("Message {}: {line}\n", i + 1))
            .collect();

        let prompt = format!(
            "Summarize this conversation between the user and the therapist. \
             Make sure every important topic and key moment of the exchange is \
             reflected. Use at most five sentences.\n\n\
             Conversation to summarize:\n{conversation}\nSummary:"
        );

        let body = json!({
            "model": self.summary_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
        });
        let response = self.chat("summarize", &body).await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .context("summarization response carried no content")?;
        debug!(lines = lines.len(), chars = content.len(), "summarization completed");
        Ok(content.trim().to_string())
    }
}

/// Tool schema the analysis model is forced to call. Matches
/// [`ContextAnalysis`]; the `description` alias inside fact drafts is
/// accepted at parse time rather than advertised here.
fn analysis_tool() -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": ANALYSIS_TOOL_NAME,
            "description": "Process the user's message against their stored facts and recent \
                            history. Return a context summary for the therapist, the ids of the \
                            facts used, any new facts worth storing, and an optional plan for \
                            merging duplicate facts.",
            "parameters": {
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "Summary of relevant facts and history for the therapist."
                    },
                    "references": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "Ids of the facts used to create the summary."
                    },
                    "factology": {
                        "type": ["array", "null"],
                        "items": {
                            "type": "object",
                            "properties": {
                                "category": {
                                    "type": "string",
                                    "description": "High-level category, e.g. 'personal_history' or 'emotions'."
                                },
                                "content": {
                                    "type": "string",
                                    "description": "The fact in third person, e.g. 'User is anxious about work.'"
                                },
                                "priority": {
                                    "type": "string",
                                    "enum": ["Critical", "High", "Mid", "Low"]
                                }
                            },
                            "required": ["category", "content", "priority"]
                        },
                        "description": "New facts extracted from the message. Null if none."
                    },
                    "reorganisation": {
                        "type": ["array", "null"],
                        "items": {
                            "type": "object",
                            "properties": {
                                "action": {"type": "string", "enum": ["merge"]},
                                "ids": {
                                    "type": "array",
                                    "items": {"type": "integer"},
                                    "description": "2 or 3 fact ids to merge."
                                },
                                "final_content": {
                                    "type": "string",
                                    "description": "Combined content for the surviving fact."
                                },
                                "reason": {"type": "string"}
                            },
                            "required": ["ids", "final_content"]
                        },
                        "description": "Optional merge plan for duplicate facts. Null if none."
                    }
                },
                "required": ["summary"]
            }
        }
    })
}
