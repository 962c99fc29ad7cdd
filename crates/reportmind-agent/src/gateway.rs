//! Model gateway — the three model operations a turn can make.
//!
//! - `decide`: completion with tool schemas and `tool_choice: auto`
//! - `finalize`: grounded completion without tools
//! - `summarize`: compresses a turn sequence into a narrative
//!
//! Nothing is retried here. Every call is bounded by the model timeout and
//! failures come back as [`ModelCallError`] tagged with the phase.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use reportmind_core::config::AgentConfig;
use reportmind_core::types::{LlmResponse, Message, ToolCall, ToolDefinition};
use reportmind_core::utils::{sanitize_text, truncate_string};
use reportmind_providers::{LlmProvider, LlmRequestConfig, ProviderError};

use crate::error::{ModelCallError, ModelPhase};
use crate::tools::CREATE_CHART_TOOL;

/// Instruction for the summarization call.
pub const SUMMARIZE_INSTRUCTION: &str = "Summarize the conversation for an insurance data assistant. \
     Keep business units, time periods, metrics, user goals and analysis context.";

/// Keys that mark a plain-text answer as a chart specification.
const CHART_KEYS: &[&str] = &["series", "xAxis", "chartType", "chart_type"];

// ─────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────

/// Validated outcome of the decision phase.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// The model answered directly.
    Final(String),
    /// The model requested tools. Any text alongside is not an answer.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// What to do with a direct answer that is really a tool call in disguise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextToolCallPolicy {
    /// Text is always an answer.
    #[default]
    Strict,
    /// A JSON object with chart keys becomes a `createChart` call.
    ChartFromJson,
}

impl TextToolCallPolicy {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            TextToolCallPolicy::ChartFromJson
        } else {
            TextToolCallPolicy::Strict
        }
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

pub struct ModelGateway {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_config: LlmRequestConfig,
    timeout: Duration,
    text_policy: TextToolCallPolicy,
}

impl ModelGateway {
    /// Gateway using the provider's default model and request settings.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            request_config: LlmRequestConfig::default(),
            timeout: Duration::from_secs(120),
            text_policy: TextToolCallPolicy::Strict,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AgentConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            request_config: LlmRequestConfig {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            timeout: Duration::from_secs(config.model_timeout_secs),
            text_policy: TextToolCallPolicy::from_flag(config.text_tool_call_fallback),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_text_policy(mut self, policy: TextToolCallPolicy) -> Self {
        self.text_policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.display_name()
    }

    /// Decision phase: answer directly or request tools.
    pub async fn decide(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Decision, ModelCallError> {
        let response = self.call(ModelPhase::Decision, messages, Some(tools)).await?;

        if response.has_tool_calls() {
            let content = response.content.filter(|c| !c.trim().is_empty());
            info!(
                calls = response.tool_calls.len(),
                premature_text = content.is_some(),
                "model requested tools"
            );
            return Ok(Decision::ToolCalls {
                content,
                calls: response.tool_calls,
            });
        }

        let raw = response.content.unwrap_or_default();
        if self.text_policy == TextToolCallPolicy::ChartFromJson {
            if let Some(call) = chart_call_from_text(&raw) {
                warn!(correlation_id = %call.id, "chart specification returned as text, converting to tool call");
                return Ok(Decision::ToolCalls {
                    content: None,
                    calls: vec![call],
                });
            }
        }

        let text = sanitize_text(&raw);
        if text.is_empty() {
            return Err(ModelCallError::EmptyDecision);
        }
        Ok(Decision::Final(text))
    }

    /// Finalization phase: grounded answer, no tools offered.
    pub async fn finalize(&self, messages: &[Message]) -> Result<String, ModelCallError> {
        let response = self.call(ModelPhase::Finalize, messages, None).await?;
        let text = sanitize_text(response.content.as_deref().unwrap_or_default());
        if text.is_empty() {
            return Err(ModelCallError::EmptyCompletion(ModelPhase::Finalize));
        }
        Ok(text)
    }

    /// Compress `turns`, folding in `prior_summary` when non-empty.
    pub async fn summarize(
        &self,
        prior_summary: &str,
        turns: &[Message],
    ) -> Result<String, ModelCallError> {
        let messages = [
            Message::system(SUMMARIZE_INSTRUCTION),
            Message::user(summarization_input(prior_summary, turns)),
        ];
        let response = self.call(ModelPhase::Summarize, &messages, None).await?;
        let summary = response.content.unwrap_or_default().trim().to_string();
        if summary.is_empty() {
            return Err(ModelCallError::EmptyCompletion(ModelPhase::Summarize));
        }
        Ok(summary)
    }

    async fn call(
        &self,
        phase: ModelPhase,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, ModelCallError> {
        debug!(
            phase = %phase,
            model = %self.model,
            messages = messages.len(),
            tools = tools.map_or(0, <[ToolDefinition]>::len),
            "model call"
        );

        let result = tokio::time::timeout(
            self.timeout,
            self.provider
                .chat(messages, tools, &self.model, &self.request_config),
        )
        .await
        .unwrap_or_else(|_| Err(ProviderError::Timeout(self.timeout.as_secs())));

        match result {
            Ok(response) => {
                debug!(
                    phase = %phase,
                    finish_reason = ?response.finish_reason,
                    content = %truncate_string(response.content.as_deref().unwrap_or_default(), 200),
                    "model responded"
                );
                Ok(response)
            }
            Err(source) => {
                warn!(phase = %phase, error = %source, "model call failed");
                Err(ModelCallError::Provider { phase, source })
            }
        }
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Text handed to the summarizer: the prior summary block, then one line per turn.
pub fn summarization_input(prior_summary: &str, turns: &[Message]) -> String {
    let transcript = turns
        .iter()
        .map(transcript_line)
        .collect::<Vec<_>>()
        .join("\n");
    if prior_summary.trim().is_empty() {
        transcript
    } else {
        format!("Previous summary:\n{}\n\n{transcript}", prior_summary.trim())
    }
}

fn transcript_line(message: &Message) -> String {
    let role = message.role();
    if message.has_tool_calls() {
        let names: Vec<&str> = message
            .tool_calls()
            .iter()
            .map(|c| c.function.name.as_str())
            .collect();
        return format!("{role}: [tool call: {}]", names.join(", "));
    }
    match message.text() {
        Some(text) if !text.is_empty() => format!("{role}: {text}"),
        _ => format!("{role}:"),
    }
}

/// Parse a direct answer that is a chart specification into a tool call.
fn chart_call_from_text(text: &str) -> Option<ToolCall> {
    let Value::Object(mut chart) = serde_json::from_str::<Value>(text.trim()).ok()? else {
        return None;
    };
    if !CHART_KEYS.iter().any(|k| chart.contains_key(*k)) {
        return None;
    }
    if !chart.contains_key("type") {
        if let Some(kind) = chart.get("chartType").or_else(|| chart.get("chart_type")).cloned() {
            chart.insert("type".to_string(), kind);
        }
    }
    let id = format!("call_{}", uuid::Uuid::new_v4().simple());
    Some(ToolCall::new(id, CREATE_CHART_TOOL, Value::Object(chart).to_string()))
}
