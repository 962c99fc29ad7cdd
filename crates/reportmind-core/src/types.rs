//! Core types for ReportMind — chat messages, tool calls, and attachments.
//!
//! Messages follow the OpenAI chat completions format used by both the
//! OpenAI and Azure OpenAI endpoints. The same `Message` enum is used for the
//! payload sent to the model and for the turns stored in conversation memory.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format.
///
/// Each variant maps to a `role` field value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },

    #[serde(rename = "tool")]
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    /// Create an assistant message recording tool calls.
    ///
    /// `content` is whatever premature text the model produced alongside the
    /// calls; it is usually `None`.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content,
            tool_calls: Some(tool_calls),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// The wire role name.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Free-text content, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::Tool { content, .. } => Some(content),
        }
    }

    /// Tool calls recorded on an assistant turn (empty for every other turn).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }

    /// Whether this is an assistant turn carrying at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

// ─────────────────────────────────────────────
// Tool Calls (function calling)
// ─────────────────────────────────────────────

/// A tool call from the assistant, requesting execution of a function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Correlation id used to match the result turn.
    pub id: String,
    /// Always "function" in the current API.
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// The function name and arguments within a tool call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the function/tool to call.
    pub name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

// ─────────────────────────────────────────────
// Tool Definitions (for LLM requests)
// ─────────────────────────────────────────────

/// Definition of a tool, sent to the LLM so it knows what tools are available.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Always "function".
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function schema.
    pub function: FunctionDefinition,
}

/// Schema of a function tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

// ─────────────────────────────────────────────
// LLM Response
// ─────────────────────────────────────────────

/// Response from an LLM provider after a chat completion call.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    /// Text content from the assistant (None if only tool calls).
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    pub tool_calls: Vec<ToolCall>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage statistics.
    pub usage: Option<UsageInfo>,
}

impl LlmResponse {
    /// Plain text response with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        LlmResponse {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Response carrying only tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        LlmResponse {
            tool_calls: calls,
            ..Default::default()
        }
    }

    /// Whether the response contains tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics from the LLM.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Provider wire types
// ─────────────────────────────────────────────

/// Raw chat completion response from an OpenAI-compatible API.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionResponse {
    /// Take the first choice, or `None` when the API returned no choices.
    pub fn into_llm_response(self) -> Option<LlmResponse> {
        let usage = self.usage;
        self.choices.into_iter().next().map(|c| LlmResponse {
            content: c.message.content,
            tool_calls: c.message.tool_calls.unwrap_or_default(),
            finish_reason: c.finish_reason,
            usage,
        })
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ─────────────────────────────────────────────
// Attachments
// ─────────────────────────────────────────────

/// Where an inbound attachment can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentRef {
    /// Plain URL; anonymous download, bearer token only after a 401/403.
    Direct(String),
    /// URL that always requires a bearer token.
    Authenticated(String),
}

impl AttachmentRef {
    pub fn url(&self) -> &str {
        match self {
            AttachmentRef::Direct(url) | AttachmentRef::Authenticated(url) => url,
        }
    }
}

/// An attachment carried by an inbound turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundAttachment {
    /// File name as sent by the user (e.g. `Book2.xlsx`).
    pub name: String,
    /// Retrieval reference. `None` when the channel gave no URL.
    pub reference: Option<AttachmentRef>,
}

impl InboundAttachment {
    pub fn new(name: impl Into<String>, reference: Option<AttachmentRef>) -> Self {
        Self {
            name: name.into(),
            reference,
        }
    }

    /// Whether this attachment is a tabular dataset the agent can ingest.
    pub fn is_dataset(&self) -> bool {
        self.name.to_lowercase().ends_with(".xlsx")
    }

    /// Dataset name: the file name without its `.xlsx` extension.
    pub fn dataset_name(&self) -> String {
        let lower = self.name.to_lowercase();
        if lower.ends_with(".xlsx") {
            self.name[..self.name.len() - ".xlsx".len()].to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Binary payload surfaced to the user (e.g. a rendered chart).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryAttachment {
    /// MIME type (e.g. "image/png").
    pub mime_type: String,
    /// Suggested file name.
    pub name: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
