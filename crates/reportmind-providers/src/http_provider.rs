//! HTTP chat-completions provider for OpenAI and Azure OpenAI.
//!
//! Both dialects share the request/response body; they differ in URL shape
//! and in how the key is presented:
//!
//! | flavor | URL | auth |
//! |---|---|---|
//! | OpenAI | `{base}/chat/completions` | `Authorization: Bearer {key}` |
//! | Azure | `{base}/openai/deployments/{deployment}/chat/completions?api-version={v}` | `api-key: {key}` |

use async_trait::async_trait;
use tracing::{debug, error};

use reportmind_core::config::{ProviderConfig, ProviderFlavor};
use reportmind_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message, ToolDefinition,
};

use crate::traits::{LlmProvider, LlmRequestConfig, ProviderError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// Chat-completions client for one configured endpoint.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    flavor: ProviderFlavor,
    /// API base URL without trailing slash.
    api_base: String,
    api_key: String,
    /// Azure only.
    api_version: String,
    /// Azure only.
    deployment: Option<String>,
    default_model: String,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("flavor", &self.flavor)
            .field("api_base", &self.api_base)
            .field("deployment", &self.deployment)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl HttpProvider {
    /// Create a provider from the `provider` config section.
    ///
    /// Azure requires both `apiBase` and `deployment`.
    pub fn new(config: &ProviderConfig, model: &str) -> Result<Self, ProviderError> {
        let api_base = match (config.flavor, config.api_base.as_deref()) {
            (_, Some(base)) => base.trim_end_matches('/').to_string(),
            (ProviderFlavor::OpenAi, None) => OPENAI_API_BASE.to_string(),
            (ProviderFlavor::Azure, None) => {
                return Err(ProviderError::Config(
                    "azure provider needs apiBase (https://<resource>.openai.azure.com)".into(),
                ))
            }
        };

        if config.flavor == ProviderFlavor::Azure && config.deployment.is_none() {
            return Err(ProviderError::Config(
                "azure provider needs a deployment name".into(),
            ));
        }

        // Per-call deadlines are enforced by the caller; this only bounds
        // a wedged connection.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(HttpProvider {
            client,
            flavor: config.flavor,
            api_base,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            deployment: config.deployment.clone(),
            default_model: model.to_string(),
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        match (self.flavor, &self.deployment) {
            (ProviderFlavor::Azure, Some(deployment)) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.api_base, deployment, self.api_version
            ),
            _ => format!("{}/chat/completions", self.api_base),
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            // Azure routes by deployment; the body carries no model.
            model: match self.flavor {
                ProviderFlavor::OpenAi => Some(model.to_string()),
                ProviderFlavor::Azure => None,
            },
            messages: messages.to_vec(),
            tools: tools.map(|t| t.to_vec()),
            tool_choice: tools.map(|_| "auto".to_string()),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        }
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError> {
        debug!(
            provider = self.display_name(),
            model = %model,
            messages = messages.len(),
            tools = tools.map_or(0, |t| t.len()),
            "Calling LLM"
        );

        let body = self.build_request(messages, tools, model, config);
        let request = self.client.post(self.completions_url()).json(&body);
        let request = match self.flavor {
            ProviderFlavor::OpenAi => request.bearer_auth(&self.api_key),
            ProviderFlavor::Azure => request.header("api-key", &self.api_key),
        };

        let response = request.send().await.map_err(|e| {
            error!(provider = self.display_name(), error = %e, "HTTP request failed");
            ProviderError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.display_name(),
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| {
                error!(provider = self.display_name(), error = %e, "Failed to parse LLM response");
                ProviderError::Decode(e.to_string())
            })?;

        let llm_resp = chat_resp
            .into_llm_response()
            .ok_or(ProviderError::EmptyChoices)?;

        debug!(
            provider = self.display_name(),
            has_content = llm_resp.content.is_some(),
            tool_calls = llm_resp.tool_calls.len(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        match self.flavor {
            ProviderFlavor::OpenAi => "OpenAI",
            ProviderFlavor::Azure => "Azure OpenAI",
        }
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an `HttpProvider` from the `provider` config section.
pub fn create_provider(config: &ProviderConfig, model: &str) -> Result<HttpProvider, ProviderError> {
    if !config.is_configured() {
        return Err(ProviderError::Config(
            "no API key configured (set provider.apiKey or REPORTMIND_PROVIDER__API_KEY)".into(),
        ));
    }

    debug!(
        flavor = ?config.flavor,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or("default"),
        "Creating LLM provider"
    );

    HttpProvider::new(config, model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
