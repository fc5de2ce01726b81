//! The LLM adapter contract: `complete`, `embed`, `chat`. Concrete
//! provider wiring (OpenAI, Claude, ...) is deliberately out of scope here —
//! callers supply an `Arc<dyn LlmAdapter>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the four roles a chat message may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the assistant, paired by `id` with the eventual
/// tool-role reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A chat message. `tool_call_id` is required (and must match a prior
/// assistant `tool_calls` entry) on `Tool`-role messages; `tool_calls` is
/// only ever populated on `Assistant`-role messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// An assistant message that also carries its tool-calls payload — the
    /// correlation token the LLM needs to accept the subsequent tool reply.
    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

/// A tool advertised to the LLM as a function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The assistant's reply to a `chat` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatResponse {
    /// `DONE` (case-insensitive, trimmed) or empty content+tool_calls both
    /// mean "goal complete, no action".
    pub fn signals_done(&self) -> bool {
        let content_done = self
            .content
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case("done"))
            .unwrap_or(false);
        let both_empty = self.content.as_deref().unwrap_or("").trim().is_empty()
            && self.tool_calls.as_ref().map(|t| t.is_empty()).unwrap_or(true);
        content_done || both_empty
    }
}

/// Options forwarded to `chat`.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub tools: Option<Vec<ToolDefinition>>,
}

/// The capability the kernel needs from an LLM provider.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Single-shot text completion (used by bookkeeping prompts like
    /// causal-inference and evolution-proposal calls).
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Embed a single string for semantic retrieval.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Multi-turn chat with optional function-calling tools.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse>;
}
