//! Prompt assembler — builds the ordered message list for every model call.
//!
//! Order is fixed and is what the model treats as authoritative:
//! 1. system instructions
//! 2. conversation summary (only when non-empty)
//! 3. active dataset context (only when a dataset was ingested)
//! 4. the working messages, oldest first
//!
//! Assembly never mutates memory.

use std::path::Path;

use anyhow::Context;
use tracing::debug;

use reportmind_core::config::AgentConfig;
use reportmind_core::types::Message;
use reportmind_core::utils::expand_home;
use reportmind_core::ConversationMemory;

// ─────────────────────────────────────────────
// Built-in instructions
// ─────────────────────────────────────────────

/// Instructions for the insurance report assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an intelligent insurance report assistant that helps users understand and process tabular data.

GENERAL BEHAVIOR:
- Be helpful, clear and concise.
- Answer in the same language as the user.
- Use tools whenever an action or external data is required.
- Never invent company data.

KNOWLEDGE BASE:
- You have access to a vector knowledge base via the tool \"retrieveKnowledgeBase\".
- It contains insurance reports stored as CSV files.
- Data includes claims, alive policies, salvage, loss ratio, KPIs, time-based metrics, business units and categories.
- This is the single source of truth for company-specific questions.
- When asked for ratios, present them as percentages with 2 decimals, e.g. 12.34%.
- When asked for economic values, present them with a euro sign and commas, e.g. €1,234,567.89.

CHART GENERATION:
- You can create visualizations using the \"createChart\" tool.
- Use charts to help users understand data trends, comparisons, and distributions.
- Suggest appropriate chart types: bar for comparisons, line for trends, pie for proportions, scatter for correlations, histogram for distributions.
- Always provide meaningful titles and axis labels.

WHEN TO USE THE KNOWLEDGE BASE:
You MUST call the retriever when the question involves:
- insurance performance
- internal reports or documents
- company KPIs or metrics
- comparisons, trends, or time-based analysis
- any information you are not completely sure about

Do NOT answer these from your own knowledge.

AFTER RECEIVING KNOWLEDGE BASE CONTENT:
- Treat it as the source of truth.
- Extract only the relevant values.
- Perform comparisons or trend analysis when requested.
- Consider creating charts to visualize the data when appropriate.
- If the data is incomplete or missing, say:
  \"I couldn't find that information in the knowledge base.\"
- Do NOT hallucinate or fill gaps.

EXCEL PROCESSING:
- When the user wants to process, split, ingest or learn from an Excel file, call the tool \"splitExcel\".
- For questions about a processed file, query its CSVs with \"readCSV\".
- Do not explain manual steps if the tool exists.

RESPONSE STYLE:
- Structured, clear and readable.
- Focus on insights, not raw dumps.
- Summarize long outputs.
- Use bullet points when helpful.
- Include the data source when available.
- Do not mention tools in the final answer.

CONTEXT PRIORITY:
1) Tool results
2) Conversation history
3) General knowledge (only for non-company questions)

IF A TOOL FAILS:
- Explain the issue briefly.
- Ask the user how to proceed.

GOAL:
Be accurate, analytical and fully grounded in the provided data.";

/// System message carrying the compressed history.
pub fn summary_message(summary: &str) -> Message {
    Message::system(format!("Conversation summary:\n{summary}"))
}

/// System message pointing follow-up questions at the active dataset.
pub fn dataset_message(dataset: &str) -> Message {
    Message::system(format!(
        "Last processed file: {dataset}.\n\
         Use this file as the default data source for follow-up analytical questions \
         unless the user specifies a different file."
    ))
}

// ─────────────────────────────────────────────
// Assembler
// ─────────────────────────────────────────────

/// Builds the payload sent to the model from a memory snapshot.
#[derive(Clone, Debug)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Built-in prompt, or the contents of `systemPromptFile` when set.
    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        match &config.system_prompt_file {
            Some(file) => Self::from_file(&expand_home(file)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read system prompt from {}", path.display()))?;
        debug!(path = %path.display(), "loaded system prompt file");
        Ok(Self::new(prompt.trim()))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ordered message list for `memory`.
    pub fn assemble(&self, memory: &ConversationMemory) -> Vec<Message> {
        let mut messages = Vec::with_capacity(memory.len() + 3);
        messages.push(Message::system(&self.system_prompt));
        if !memory.summary().is_empty() {
            messages.push(summary_message(memory.summary()));
        }
        if let Some(dataset) = memory.last_active_dataset() {
            messages.push(dataset_message(dataset));
        }
        messages.extend(memory.working_messages().iter().cloned());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportmind_core::types::ToolCall;

    fn memory_with_history() -> ConversationMemory {
        let mut memory = ConversationMemory::new("c1");
        memory.push_user("Show claims by quarter");
        memory
            .push_tool_calls(None, vec![ToolCall::new("call_1", "readCSV", "{}")])
            .unwrap();
        memory.push_tool_result("call_1", r#"{"Q1":10}"#).unwrap();
        memory.push_assistant("Q1 had 10 claims.").unwrap();
        memory
    }

    #[test]
    fn test_empty_memory_is_system_only() {
        let messages = PromptAssembler::default().assemble(&ConversationMemory::new("c1"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[test]
    fn test_full_ordering() {
        let mut memory = memory_with_history();
        memory.apply_compaction("User studies Motor claims for 2024.", 4);
        memory.set_active_dataset("Book2");

        let messages = PromptAssembler::new("be precise").assemble(&memory);
        assert_eq!(messages.len(), 3 + 4);
        assert_eq!(messages[0], Message::system("be precise"));
        assert_eq!(
            messages[1].text(),
            Some("Conversation summary:\nUser studies Motor claims for 2024.")
        );
        assert!(messages[2].text().unwrap().starts_with("Last processed file: Book2."));
        assert_eq!(&messages[3..], memory.working_messages());
    }

    #[test]
    fn test_dataset_without_summary() {
        let mut memory = memory_with_history();
        memory.set_active_dataset("Book2");
        let messages = PromptAssembler::default().assemble(&memory);
        assert_eq!(messages[1], dataset_message("Book2"));
        assert_eq!(messages[2].role(), "user");
    }

    #[test]
    fn test_assembly_does_not_mutate() {
        let memory = memory_with_history();
        let before = memory.clone();
        let assembler = PromptAssembler::default();
        assert_eq!(assembler.assemble(&memory), assembler.assemble(&memory));
        assert_eq!(memory.working_messages(), before.working_messages());
    }

    #[test]
    fn test_prompt_file_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Custom instructions\n").unwrap();
        let config = AgentConfig {
            system_prompt_file: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let assembler = PromptAssembler::from_config(&config).unwrap();
        assert_eq!(assembler.system_prompt(), "Custom instructions");
    }

    #[test]
    fn test_missing_prompt_file_is_error() {
        let config = AgentConfig {
            system_prompt_file: Some("/nonexistent/prompt.md".into()),
            ..Default::default()
        };
        assert!(PromptAssembler::from_config(&config).is_err());
    }
}
