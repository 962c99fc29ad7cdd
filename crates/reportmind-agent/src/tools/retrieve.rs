//! Semantic retrieval over the vector knowledge base.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use reportmind_core::utils::sanitize_text;

use super::base::{require_string, Tool, ToolOutput};
use super::subprocess::ScriptRunner;

const SCRIPT: &str = "Retrieve_knowledgeBase.py";

pub struct RetrieveKnowledgeBaseTool {
    runner: ScriptRunner,
}

impl RetrieveKnowledgeBaseTool {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RetrieveKnowledgeBaseTool {
    fn name(&self) -> &str {
        "retrieveKnowledgeBase"
    }

    fn description(&self) -> &str {
        "Searches for information in the vector knowledge base using a natural language query"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Semantic search text" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<ToolOutput> {
        let query = require_string(&params, "query")?;
        let out = self.runner.run(SCRIPT, &[query], None).await?;
        // The retriever may print partial hits before exiting non-zero.
        if out.success() || !out.stdout.is_empty() {
            Ok(ToolOutput::text(sanitize_text(&out.stdout)))
        } else {
            anyhow::bail!(out.failure_reason())
        }
    }

    fn progress_notice(&self, _params: &HashMap<String, Value>) -> Option<String> {
        Some("Searching in the knowledge base...".to_string())
    }
}
