//! LLM provider trait — the seam between the model gateway and a
//! chat-completion backend.
//!
//! `HttpProvider` in `http_provider.rs` covers OpenAI and Azure OpenAI; tests
//! substitute scripted providers.

use async_trait::async_trait;
use reportmind_core::types::{LlmResponse, Message, ToolDefinition};
use thiserror::Error;

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

/// Why a chat completion call produced no usable response.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no choices")]
    EmptyChoices,

    #[error("no response within {0}s")]
    Timeout(u64),

    #[error("provider misconfigured: {0}")]
    Config(String),
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` — Conversation payload in OpenAI format.
    /// * `tools`    — Tool schemas; `Some` also sets `tool_choice: "auto"`.
    /// * `model`    — Model identifier (ignored by deployment-routed backends).
    /// * `config`   — Temperature, max_tokens.
    ///
    /// Failures are returned as `ProviderError`, never folded into content.
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
