//! LLM provider layer for ReportMind.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`http_provider::HttpProvider`] — OpenAI / Azure OpenAI chat-completions client
//! - [`http_provider::create_provider`] — builder from the `provider` config section

pub mod http_provider;
pub mod traits;

pub use http_provider::{create_provider, HttpProvider};
pub use traits::{LlmProvider, LlmRequestConfig, ProviderError};
