//! Chart rendering through the matplotlib MCP script.
//!
//! The script reads one `tools/call` request on stdin and answers with
//! `{"content": [{"type": "text", "text": ...}, {"type": "image", "data": <base64 png>}]}`.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use reportmind_core::types::BinaryAttachment;
use reportmind_core::utils::truncate_string;

use super::base::{optional_string, Tool, ToolOutput};
use super::subprocess::ScriptRunner;

/// Wire name of the chart tool.
pub const CREATE_CHART_TOOL: &str = "createChart";

const SCRIPT: &str = "mcp_matplotlib.py";
const DEFAULT_MESSAGE: &str = "Chart created successfully";

pub struct CreateChartTool {
    runner: ScriptRunner,
}

impl CreateChartTool {
    pub fn new(runner: ScriptRunner) -> Self {
        // The reply carries a base64 PNG; truncating it would corrupt the image.
        Self {
            runner: runner.with_max_output_chars(usize::MAX),
        }
    }

    fn mcp_request(params: &HashMap<String, Value>) -> Value {
        let arguments: serde_json::Map<String, Value> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        json!({
            "method": "tools/call",
            "params": { "name": "create_chart", "arguments": arguments }
        })
    }

    fn parse_response(stdout: &str) -> anyhow::Result<ToolOutput> {
        let response: Value = serde_json::from_str(stdout).map_err(|e| {
            anyhow::anyhow!(
                "Failed to parse MCP response: {e}. Raw output: {}",
                truncate_string(stdout, 200)
            )
        })?;

        let Some(first) = response
            .get("content")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
        else {
            return Ok(ToolOutput::text(DEFAULT_MESSAGE));
        };

        let message = first
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string();

        let image = response
            .pointer("/content/1/data")
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty());
        match image {
            Some(data) => {
                let bytes = STANDARD
                    .decode(data.trim())
                    .map_err(|e| anyhow::anyhow!("chart image is not valid base64: {e}"))?;
                let attachment = BinaryAttachment {
                    mime_type: "image/png".to_string(),
                    name: format!("chart_{}.png", chrono::Utc::now().timestamp_millis()),
                    data: bytes,
                };
                Ok(ToolOutput::with_attachment(message, attachment))
            }
            None => Ok(ToolOutput::text(message)),
        }
    }
}

/// Title used for notices and the delivery caption.
pub fn chart_label(params: &HashMap<String, Value>) -> Option<String> {
    optional_string(params, "title")
        .filter(|t| !t.trim().is_empty())
        .or_else(|| optional_string(params, "type"))
        .or_else(|| optional_string(params, "chart_type"))
}

#[async_trait]
impl Tool for CreateChartTool {
    fn name(&self) -> &str {
        CREATE_CHART_TOOL
    }

    fn description(&self) -> &str {
        "Creates a chart (line, bar, scatter, histogram or pie) from data series \
         and shows it to the user as an image."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["line", "bar", "scatter", "histogram", "pie"],
                    "description": "Chart type"
                },
                "title": { "type": "string", "description": "Chart title" },
                "xAxis": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" },
                        "categories": { "type": "array", "items": { "type": "string" } }
                    }
                },
                "yAxis": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" }
                    }
                },
                "series": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "data": { "type": "array", "items": { "type": "number" } }
                        }
                    }
                }
            },
            "required": ["type", "series"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolOutput> {
        let request = Self::mcp_request(&params).to_string();
        let out = self.runner.run(SCRIPT, &[], Some(&request)).await?;
        let stdout = out.stdout.trim();
        if stdout.is_empty() {
            anyhow::bail!(out.failure_reason());
        }
        Self::parse_response(stdout)
    }

    fn progress_notice(&self, params: &HashMap<String, Value>) -> Option<String> {
        let label = chart_label(params).unwrap_or_default();
        Some(format!("Creating chart: {label}..."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> HashMap<String, Value> {
        value.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn test_mcp_request_shape() {
        let request = CreateChartTool::mcp_request(&params(json!({
            "type": "bar",
            "series": [{ "name": "Claims", "data": [1, 2] }]
        })));
        assert_eq!(request["method"], "tools/call");
        assert_eq!(request["params"]["name"], "create_chart");
        assert_eq!(request["params"]["arguments"]["type"], "bar");
    }

    #[test]
    fn test_parse_with_image() {
        let png = STANDARD.encode([0x89, b'P', b'N', b'G']);
        let stdout = json!({
            "content": [
                { "type": "text", "text": "Bar chart rendered" },
                { "type": "image", "data": png }
            ]
        })
        .to_string();
        let out = CreateChartTool::parse_response(&stdout).unwrap();
        assert_eq!(out.text, "Bar chart rendered");
        let attachment = out.attachment.unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data, vec![0x89, b'P', b'N', b'G']);
        assert!(attachment.name.starts_with("chart_"));
    }

    #[test]
    fn test_parse_without_content() {
        let out = CreateChartTool::parse_response("{}").unwrap();
        assert_eq!(out.text, DEFAULT_MESSAGE);
        assert!(out.attachment.is_none());
    }

    #[test]
    fn test_parse_garbage() {
        let err = CreateChartTool::parse_response("not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse MCP response"));
    }

    #[test]
    fn test_chart_label_fallbacks() {
        assert_eq!(
            chart_label(&params(json!({ "title": "Claims by quarter", "type": "bar" }))).as_deref(),
            Some("Claims by quarter")
        );
        assert_eq!(chart_label(&params(json!({ "type": "pie" }))).as_deref(), Some("pie"));
        assert_eq!(chart_label(&params(json!({}))), None);
    }

    #[tokio::test]
    async fn test_execute_reads_stdin_request() {
        let dir = tempfile::tempdir().unwrap();
        // Echo the requested chart type back as the narrative.
        std::fs::write(
            dir.path().join(SCRIPT),
            "read req\nkind=$(echo \"$req\" | sed 's/.*\"type\":\"\\([a-z]*\\)\".*/\\1/')\n\
             printf '{\"content\":[{\"type\":\"text\",\"text\":\"%s chart\"}]}\\n' \"$kind\"\n",
        )
        .unwrap();
        let tool = CreateChartTool::new(ScriptRunner::new("sh", dir.path()));
        let out = tool
            .execute(params(json!({ "type": "line", "series": [] })))
            .await
            .unwrap();
        assert_eq!(out.text, "line chart");
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCRIPT), "echo 'no backend' >&2\nexit 1\n").unwrap();
        let tool = CreateChartTool::new(ScriptRunner::new("sh", dir.path()));
        let err = tool
            .execute(params(json!({ "type": "line", "series": [] })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no backend");
    }
}
