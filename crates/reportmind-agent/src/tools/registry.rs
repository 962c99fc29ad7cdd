//! Tool registry — the executor bridge between the orchestrator and the
//! external capabilities.
//!
//! Every invocation yields a [`ToolInvocationResult`] tagged with the
//! originating correlation id. Nothing is retried: unknown tools, malformed
//! arguments, execution errors and timeouts all come back as failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use reportmind_core::types::{BinaryAttachment, ToolCall, ToolDefinition};
use reportmind_core::utils::truncate_string;

use super::base::{Tool, ToolOutput};
use super::schema;
use crate::error::ToolFailure;

/// Default upper bound for one invocation.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────
// Request / result
// ─────────────────────────────────────────────

/// A tool call requested by the model, as handed to the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocationRequest {
    pub correlation_id: String,
    pub name: String,
    /// JSON-encoded arguments exactly as the model produced them.
    pub raw_arguments: String,
}

impl ToolInvocationRequest {
    pub fn new(
        correlation_id: impl Into<String>,
        name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    /// Parsed arguments; an empty string counts as `{}`.
    pub fn arguments(&self) -> Result<Value, serde_json::Error> {
        if self.raw_arguments.trim().is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str(&self.raw_arguments)
        }
    }
}

impl From<&ToolCall> for ToolInvocationRequest {
    fn from(call: &ToolCall) -> Self {
        Self::new(&call.id, &call.function.name, &call.function.arguments)
    }
}

/// Outcome of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocationResult {
    pub correlation_id: String,
    pub tool: String,
    pub outcome: Result<ToolOutput, ToolFailure>,
}

impl ToolInvocationResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Content of the `tool` turn recorded for this result.
    pub fn turn_content(&self) -> String {
        match &self.outcome {
            Ok(output) if output.text.trim().is_empty() => "Done.".to_string(),
            Ok(output) => output.text.clone(),
            Err(failure) => failure.diagnostic(),
        }
    }

    /// Binary payload to surface directly to the user, if any.
    pub fn attachment(&self) -> Option<&BinaryAttachment> {
        self.outcome.as_ref().ok().and_then(|o| o.attachment.as_ref())
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name and dispatches invocations.
///
/// Owns `Arc<dyn Tool>` so tools can be shared across tasks.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the default invocation timeout.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Bound every invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Overwrites any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!(tool = tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Model-facing definitions for all registered tools.
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Notice to show the user before `request` runs.
    pub fn progress_notice(&self, request: &ToolInvocationRequest) -> Option<String> {
        let tool = self.tools.get(&request.name)?;
        let params = object_params(request.arguments().ok()?)?;
        tool.progress_notice(&params)
    }

    /// Validate and execute one request.
    pub async fn invoke(&self, request: &ToolInvocationRequest) -> ToolInvocationResult {
        let outcome = self.run(request).await;
        match &outcome {
            Ok(output) => debug!(
                tool = %request.name,
                correlation_id = %request.correlation_id,
                attachment = output.attachment.is_some(),
                result = %truncate_string(&output.text, 200),
                "tool succeeded"
            ),
            Err(failure) => warn!(
                tool = %request.name,
                correlation_id = %request.correlation_id,
                error = %failure,
                "tool failed"
            ),
        }
        ToolInvocationResult {
            correlation_id: request.correlation_id.clone(),
            tool: request.name.clone(),
            outcome,
        }
    }

    /// Execute a whole decision batch concurrently.
    ///
    /// Results come back in the order of `requests`.
    pub async fn invoke_batch(&self, requests: &[ToolInvocationRequest]) -> Vec<ToolInvocationResult> {
        join_all(requests.iter().map(|r| self.invoke(r))).await
    }

    async fn run(&self, request: &ToolInvocationRequest) -> Result<ToolOutput, ToolFailure> {
        let tool = self
            .tools
            .get(&request.name)
            .ok_or_else(|| ToolFailure::UnknownTool(request.name.clone()))?;

        let malformed = |reason: String| ToolFailure::MalformedArguments {
            tool: request.name.clone(),
            reason,
        };

        let arguments = request
            .arguments()
            .map_err(|e| malformed(format!("arguments are not valid JSON: {e}")))?;
        schema::validate(&tool.parameters(), &arguments).map_err(malformed)?;
        let params = object_params(arguments)
            .ok_or_else(|| malformed("arguments must be a JSON object".to_string()))?;

        info!(
            tool = %request.name,
            correlation_id = %request.correlation_id,
            "executing tool call"
        );

        match tokio::time::timeout(self.timeout, tool.execute(params)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ToolFailure::Execution {
                tool: request.name.clone(),
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(ToolFailure::Timeout {
                tool: request.name.clone(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn object_params(arguments: Value) -> Option<HashMap<String, Value>> {
    match arguments {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
