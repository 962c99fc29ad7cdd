//! Tool modules for the ReportMind agent.

pub mod base;
pub mod chart;
pub mod csv_query;
pub mod ingest;
pub mod registry;
pub mod retrieve;
pub mod schema;
pub mod subprocess;

use std::sync::Arc;
use std::time::Duration;

use reportmind_core::config::ToolsConfig;

pub use base::{optional_i64, optional_string, require_string, Tool, ToolOutput};
pub use chart::{CreateChartTool, CREATE_CHART_TOOL};
pub use csv_query::ReadCsvTool;
pub use ingest::{SplitExcelTool, SPLIT_EXCEL_TOOL};
pub use registry::{ToolInvocationRequest, ToolInvocationResult, ToolRegistry};
pub use retrieve::RetrieveKnowledgeBaseTool;
pub use subprocess::{ScriptOutput, ScriptRunner};

/// Registry with the four report tools, all backed by the configured scripts.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let runner = ScriptRunner::from_config(config);
    let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(config.timeout_secs));
    registry.register(Arc::new(SplitExcelTool::new(runner.clone())));
    registry.register(Arc::new(RetrieveKnowledgeBaseTool::new(runner.clone())));
    registry.register(Arc::new(ReadCsvTool::new(runner.clone())));
    registry.register(Arc::new(CreateChartTool::new(runner)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_tools() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(
            registry.tool_names(),
            vec!["createChart", "readCSV", "retrieveKnowledgeBase", "splitExcel"]
        );
    }

    #[test]
    fn test_definitions_are_stable() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(registry.get_definitions(), registry.get_definitions());
        let chart = registry.get(CREATE_CHART_TOOL).unwrap().parameters();
        assert_eq!(chart["required"], serde_json::json!(["type", "series"]));
    }
}
