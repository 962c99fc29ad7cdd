//! Tool trait — the interface every external capability implements.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use reportmind_core::types::{BinaryAttachment, ToolDefinition};

// ─────────────────────────────────────────────
// Tool output
// ─────────────────────────────────────────────

/// Successful tool result: narrative text, plus an optional binary payload
/// that is surfaced to the user instead of being fed to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub attachment: Option<BinaryAttachment>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(text: impl Into<String>, attachment: BinaryAttachment) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }
}

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every tool implements this trait.
///
/// The orchestrator sends schemas to the model via `to_definition()`; the
/// registry validates arguments against `parameters()` and dispatches calls
/// via `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the model to call this tool (e.g. `"readCSV"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters.
    ///
    /// Must be `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Execute the tool with already-validated arguments.
    ///
    /// On failure, return an `Err`; the registry turns it into a
    /// diagnostic for the model.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolOutput>;

    /// Notice shown to the user while the tool runs, if any.
    fn progress_notice(&self, _params: &HashMap<String, Value>) -> Option<String> {
        None
    }

    /// Build the `ToolDefinition` sent to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param, returning a user-friendly error.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

/// Extract an optional `String` param.
pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Extract an optional integer param.
pub fn optional_i64(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_string_present() {
        let mut params = HashMap::new();
        params.insert("fileName".into(), json!("Book2.xlsx"));
        assert_eq!(require_string(&params, "fileName").unwrap(), "Book2.xlsx");
    }

    #[test]
    fn test_require_string_missing_or_wrong_type() {
        let mut params = HashMap::new();
        assert!(require_string(&params, "query").is_err());
        params.insert("query".into(), json!(42));
        assert!(require_string(&params, "query").is_err());
    }

    #[test]
    fn test_optional_helpers() {
        let mut params = HashMap::new();
        params.insert("column".into(), json!("Claims"));
        params.insert("n".into(), json!(5));
        assert_eq!(optional_string(&params, "column"), Some("Claims".into()));
        assert_eq!(optional_string(&params, "other"), None);
        assert_eq!(optional_i64(&params, "n"), Some(5));
        assert_eq!(optional_i64(&params, "missing"), None);
    }

    #[tokio::test]
    async fn test_to_definition_default() {
        struct DummyTool;

        #[async_trait]
        impl Tool for DummyTool {
            fn name(&self) -> &str { "dummy" }
            fn description(&self) -> &str { "A test tool" }
            fn parameters(&self) -> Value {
                json!({
                    "type": "object",
                    "properties": { "msg": { "type": "string" } },
                    "required": ["msg"]
                })
            }
            async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<ToolOutput> {
                Ok(ToolOutput::text("ok"))
            }
        }

        let def = DummyTool.to_definition();
        assert_eq!(def.function.name, "dummy");
        assert_eq!(def.tool_type, "function");
        assert!(DummyTool.progress_notice(&HashMap::new()).is_none());
    }
}
