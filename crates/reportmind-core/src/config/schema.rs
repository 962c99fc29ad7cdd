//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProviderConfig`, `ToolsConfig`,
//! `AttachmentsConfig`, `SessionsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.reportmind/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub provider: ProviderConfig,
    pub tools: ToolsConfig,
    pub attachments: AttachmentsConfig,
    pub sessions: SessionsConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Orchestration settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Model identifier (ignored by Azure, which routes by deployment).
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Replaces the built-in system prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<String>,
    /// Upper bound for a single model call, in seconds.
    pub model_timeout_secs: u64,
    /// Working-window compaction.
    pub compaction: CompactionConfig,
    /// Treat chart JSON returned as plain text as a chart tool call.
    pub text_tool_call_fallback: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            system_prompt_file: None,
            model_timeout_secs: 120,
            compaction: CompactionConfig::default(),
            text_tool_call_fallback: false,
        }
    }
}

/// When and how far the working window is compacted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompactionConfig {
    /// Compaction runs once the window holds more turns than this.
    pub threshold: usize,
    /// Number of most recent turns kept after compaction.
    pub keep_recent: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: 12,
            keep_recent: 6,
        }
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// API dialect spoken by the chat-completion endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFlavor {
    /// `POST {apiBase}/chat/completions` with a bearer key.
    #[default]
    OpenAi,
    /// `POST {apiBase}/openai/deployments/{deployment}/chat/completions?api-version=…`
    /// with an `api-key` header.
    Azure,
}

/// Chat-completion endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub flavor: ProviderFlavor,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (e.g. `https://api.openai.com/v1` or `https://myres.openai.azure.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Azure API version.
    pub api_version: String,
    /// Azure deployment name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            flavor: ProviderFlavor::OpenAi,
            api_key: String::new(),
            api_base: None,
            api_version: "2024-12-01-preview".to_string(),
            deployment: None,
        }
    }
}

impl ProviderConfig {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// External script tools (ingestion, retrieval, CSV query, charts).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Python interpreter used to run the tool scripts.
    pub python: String,
    /// Directory containing the tool scripts.
    pub scripts_dir: String,
    /// Data root (raw uploads, processed CSVs, knowledge base).
    pub data_dir: String,
    /// Upper bound for a single tool invocation, in seconds.
    pub timeout_secs: u64,
    /// Tool output longer than this is truncated before reaching the model.
    pub max_output_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            scripts_dir: "~/.reportmind/Python-api".to_string(),
            data_dir: "~/.reportmind/Data".to_string(),
            timeout_secs: 120,
            max_output_chars: 20_000,
        }
    }
}

// ─────────────────────────────────────────────
// Attachments
// ─────────────────────────────────────────────

/// Attachment retrieval.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentsConfig {
    /// Where downloaded datasets are stored before ingestion.
    pub raw_dir: String,
    /// Client-credentials settings for authenticated downloads.
    pub auth: AttachmentAuthConfig,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            raw_dir: "~/.reportmind/Data/Data raw".to_string(),
            auth: AttachmentAuthConfig::default(),
        }
    }
}

/// OAuth2 client-credentials flow used to obtain the bearer token.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub scope: String,
}

impl Default for AttachmentAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token"
                .to_string(),
            scope: "https://api.botframework.com/.default".to_string(),
        }
    }
}

impl AttachmentAuthConfig {
    /// Whether client credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

// ─────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────

/// Conversation memory durability.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsConfig {
    /// Persist each conversation as JSONL after every turn.
    pub persist: bool,
    /// Directory for the JSONL files.
    pub dir: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            persist: false,
            dir: "~/.reportmind/sessions".to_string(),
        }
    }
}
