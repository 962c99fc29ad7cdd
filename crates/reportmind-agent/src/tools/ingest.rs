//! Dataset ingestion — partitions an uploaded Excel workbook into CSVs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool, ToolOutput};
use super::subprocess::ScriptRunner;

/// Wire name; also used by the orchestrator for attachment ingestion.
pub const SPLIT_EXCEL_TOOL: &str = "splitExcel";

const SCRIPT: &str = "Script_particion_excel_to_csv.py";

pub struct SplitExcelTool {
    runner: ScriptRunner,
}

impl SplitExcelTool {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for SplitExcelTool {
    fn name(&self) -> &str {
        SPLIT_EXCEL_TOOL
    }

    fn description(&self) -> &str {
        "Processes an Excel file and splits it into CSV datasets. \
         Use it whenever the user wants to process, split or ingest an Excel file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "fileName": {
                    "type": "string",
                    "description": "Name of the Excel file, e.g. Book2.xlsx"
                }
            },
            "required": ["fileName"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolOutput> {
        let file_name = require_string(&params, "fileName")?;
        let out = self.runner.run(SCRIPT, &[file_name.clone()], None).await?;
        if !out.success() {
            anyhow::bail!(out.failure_reason());
        }
        Ok(ToolOutput::text(format!(
            "File {} processed correctly. Output: {}",
            file_name,
            out.stdout.trim()
        )))
    }

    fn progress_notice(&self, params: &HashMap<String, Value>) -> Option<String> {
        let file_name = params.get("fileName")?.as_str()?;
        Some(format!("Processing the file {file_name}..."))
    }
}
