//! Analytical queries over a processed CSV dataset.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use reportmind_core::utils::truncate_string;

use super::base::{optional_i64, optional_string, require_string, Tool, ToolOutput};
use super::subprocess::ScriptRunner;

const SCRIPT: &str = "Read_CSV.py";

pub struct ReadCsvTool {
    runner: ScriptRunner,
}

impl ReadCsvTool {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }

    /// Positional `fileName queryType`, then the optional flags.
    fn script_args(params: &HashMap<String, Value>) -> anyhow::Result<Vec<String>> {
        let mut args = vec![
            require_string(params, "fileName")?,
            require_string(params, "queryType")?,
        ];
        if let Some(column) = optional_string(params, "column") {
            args.push("--columna".to_string());
            args.push(column);
        }
        if let Some(n) = optional_i64(params, "n") {
            args.push("--n".to_string());
            args.push(n.to_string());
        }
        Ok(args)
    }
}

#[async_trait]
impl Tool for ReadCsvTool {
    fn name(&self) -> &str {
        "readCSV"
    }

    fn description(&self) -> &str {
        "Reads and analyzes data from a processed CSV file. \
         Use it to count rows, describe columns, list top values, sum a column or sample rows."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "fileName": {
                    "type": "string",
                    "description": "Name of the CSV file, e.g. Book2_Sheet1.csv"
                },
                "queryType": {
                    "type": "string",
                    "enum": ["count", "describe", "head", "top", "sum", "sample"],
                    "description": "Kind of query to run"
                },
                "column": {
                    "type": "string",
                    "description": "Column to analyze (for top, sum and describe)"
                },
                "n": {
                    "type": "integer",
                    "description": "Number of rows or values to return"
                }
            },
            "required": ["fileName", "queryType"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolOutput> {
        let args = Self::script_args(&params)?;
        let out = self.runner.run(SCRIPT, &args, None).await?;

        let stdout = out.stdout.trim();
        if stdout.is_empty() {
            anyhow::bail!(out.failure_reason());
        }
        let value: Value = serde_json::from_str(stdout).map_err(|e| {
            anyhow::anyhow!(
                "could not parse CSV result: {e}. Raw output: {}",
                truncate_string(stdout, 200)
            )
        })?;
        if let Some(error) = value.get("error") {
            let reason = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            anyhow::bail!(reason);
        }
        Ok(ToolOutput::text(value.to_string()))
    }

    fn progress_notice(&self, _params: &HashMap<String, Value>) -> Option<String> {
        Some("Reading CSV data...".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_with(body: &str) -> (ReadCsvTool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCRIPT), body).unwrap();
        (ReadCsvTool::new(ScriptRunner::new("sh", dir.path())), dir)
    }

    fn params(value: Value) -> HashMap<String, Value> {
        value.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn test_script_args_with_flags() {
        let args = ReadCsvTool::script_args(&params(json!({
            "fileName": "Book2_Sheet1.csv",
            "queryType": "top",
            "column": "Claims",
            "n": 5
        })))
        .unwrap();
        assert_eq!(
            args,
            vec!["Book2_Sheet1.csv", "top", "--columna", "Claims", "--n", "5"]
        );
    }

    #[test]
    fn test_script_args_minimal() {
        let args = ReadCsvTool::script_args(&params(json!({
            "fileName": "Book2_Sheet1.csv",
            "queryType": "count"
        })))
        .unwrap();
        assert_eq!(args, vec!["Book2_Sheet1.csv", "count"]);
    }

    #[tokio::test]
    async fn test_json_result_is_turn_content() {
        let (tool, _dir) = tool_with("echo '{\"rows\": 1204}'\n");
        let out = tool
            .execute(params(json!({ "fileName": "a.csv", "queryType": "count" })))
            .await
            .unwrap();
        assert_eq!(out.text, r#"{"rows":1204}"#);
    }

    #[tokio::test]
    async fn test_error_field_is_failure() {
        let (tool, _dir) = tool_with("echo '{\"error\": \"column Claims not found\"}'\n");
        let err = tool
            .execute(params(json!({ "fileName": "a.csv", "queryType": "sum", "column": "Claims" })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "column Claims not found");
    }

    #[tokio::test]
    async fn test_non_json_output_is_failure() {
        let (tool, _dir) = tool_with("echo 'Traceback (most recent call last)'\n");
        let err = tool
            .execute(params(json!({ "fileName": "a.csv", "queryType": "head" })))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("could not parse CSV result"));
    }
}
