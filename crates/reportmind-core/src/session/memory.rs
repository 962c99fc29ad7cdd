//! Per-conversation memory: the working window of turns, the compressed
//! summary of evicted turns, and the active dataset pointer.
//!
//! Every mutation goes through a method that keeps tool turns correlated:
//! a `tool` turn is accepted only when it answers a call recorded on the
//! latest assistant tool-call turn and no other turn has been appended since.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::MemoryError;
use crate::types::{Message, ToolCall};

/// State kept for one conversation id.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationMemory {
    pub(crate) conversation_id: String,
    pub(crate) working_messages: Vec<Message>,
    pub(crate) summary: String,
    pub(crate) last_active_dataset: Option<String>,
    pub(crate) datasets: Vec<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl ConversationMemory {
    /// Create an empty memory record.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            working_messages: Vec::new(),
            summary: String::new(),
            last_active_dataset: None,
            datasets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The working window, oldest turn first.
    pub fn working_messages(&self) -> &[Message] {
        &self.working_messages
    }

    /// Number of turns in the working window.
    pub fn len(&self) -> usize {
        self.working_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working_messages.is_empty()
    }

    /// Compressed summary of evicted turns; empty until the first compaction.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn last_active_dataset(&self) -> Option<&str> {
        self.last_active_dataset.as_deref()
    }

    /// Every dataset ingested in this conversation, in ingestion order.
    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Correlation ids of the latest tool-call batch that have no result yet.
    ///
    /// Empty when the latest batch is fully answered or when any non-tool
    /// turn followed it.
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        let Some(batch_index) = self.latest_open_batch() else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.working_messages[batch_index + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.working_messages[batch_index]
            .tool_calls()
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Index of the latest assistant tool-call turn, if only tool turns follow it.
    fn latest_open_batch(&self) -> Option<usize> {
        for (i, msg) in self.working_messages.iter().enumerate().rev() {
            match msg {
                Message::Tool { .. } => continue,
                m if m.has_tool_calls() => return Some(i),
                _ => return None,
            }
        }
        None
    }

    // ─────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append a final assistant answer.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<(), MemoryError> {
        self.ensure_nothing_pending()?;
        self.push(Message::assistant(content));
        Ok(())
    }

    /// Append an assistant turn recording a batch of tool calls.
    pub fn push_tool_calls(
        &mut self,
        content: Option<String>,
        calls: Vec<ToolCall>,
    ) -> Result<(), MemoryError> {
        if calls.is_empty() {
            return Err(MemoryError::EmptyToolBatch);
        }
        let mut seen = HashSet::new();
        for call in &calls {
            if call.id.is_empty() {
                return Err(MemoryError::EmptyCorrelationId);
            }
            if !seen.insert(call.id.as_str()) {
                return Err(MemoryError::DuplicateCorrelationId(call.id.clone()));
            }
        }
        self.ensure_nothing_pending()?;
        self.push(Message::assistant_tool_calls(content, calls));
        Ok(())
    }

    /// Append the result of one pending tool call.
    pub fn push_tool_result(
        &mut self,
        tool_call_id: &str,
        content: impl Into<String>,
    ) -> Result<(), MemoryError> {
        if tool_call_id.is_empty() {
            return Err(MemoryError::EmptyCorrelationId);
        }
        if !self.pending_tool_calls().contains(&tool_call_id) {
            return Err(MemoryError::UncorrelatedToolResult(tool_call_id.to_string()));
        }
        self.push(Message::tool_result(tool_call_id, content));
        Ok(())
    }

    /// Record a successfully ingested dataset as the default data source.
    pub fn set_active_dataset(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.datasets.contains(&name) {
            self.datasets.push(name.clone());
        }
        self.last_active_dataset = Some(name);
        self.updated_at = Utc::now();
    }

    /// Whether the working window has grown past `threshold` turns.
    pub fn needs_compaction(&self, threshold: usize) -> bool {
        self.working_messages.len() > threshold
    }

    /// Replace the summary and trim the window to its most recent turns.
    ///
    /// At least one turn always survives. Tool turns left at the head of the
    /// window after the trim lost their originating call record and are
    /// dropped as well.
    pub fn apply_compaction(&mut self, summary: impl Into<String>, keep_recent: usize) {
        self.summary = summary.into();

        let len = self.working_messages.len();
        let keep = keep_recent.max(1).min(len);
        let mut start = len - keep;
        while start + 1 < len && matches!(self.working_messages[start], Message::Tool { .. }) {
            start += 1;
        }
        self.working_messages.drain(..start);
        self.updated_at = Utc::now();
    }

    fn ensure_nothing_pending(&self) -> Result<(), MemoryError> {
        let pending = self.pending_tool_calls().len();
        if pending > 0 {
            Err(MemoryError::PendingToolCalls(pending))
        } else {
            Ok(())
        }
    }

    fn push(&mut self, message: Message) {
        self.working_messages.push(message);
        self.updated_at = Utc::now();
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, "{}")
    }

    #[test]
    fn test_new_memory_is_empty() {
        let mem = ConversationMemory::new("c1");
        assert_eq!(mem.conversation_id(), "c1");
        assert!(mem.is_empty());
        assert_eq!(mem.summary(), "");
        assert!(mem.last_active_dataset().is_none());
    }

    #[test]
    fn test_tool_round_trip_sequence() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_user("What was total claims in Q1?");
        mem.push_tool_calls(None, vec![call("call_1", "retrieveKnowledgeBase")])
            .unwrap();
        assert_eq!(mem.pending_tool_calls(), vec!["call_1"]);

        mem.push_tool_result("call_1", "Q1 claims: 1,204").unwrap();
        assert!(mem.pending_tool_calls().is_empty());

        mem.push_assistant("Total claims in Q1 were 1,204.").unwrap();
        let roles: Vec<&str> = mem.working_messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
    }

    #[test]
    fn test_tool_result_without_call_rejected() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_user("hi");
        let err = mem.push_tool_result("call_x", "data").unwrap_err();
        assert_eq!(err, MemoryError::UncorrelatedToolResult("call_x".into()));
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_tool_result_with_wrong_id_rejected() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_tool_calls(None, vec![call("call_1", "readCSV")]).unwrap();
        assert!(matches!(
            mem.push_tool_result("call_2", "x"),
            Err(MemoryError::UncorrelatedToolResult(_))
        ));
    }

    #[test]
    fn test_tool_result_answered_twice_rejected() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_tool_calls(None, vec![call("a", "readCSV"), call("b", "readCSV")])
            .unwrap();
        mem.push_tool_result("a", "one").unwrap();
        assert!(mem.push_tool_result("a", "again").is_err());
        mem.push_tool_result("b", "two").unwrap();
    }

    #[test]
    fn test_tool_result_after_user_turn_rejected() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_tool_calls(None, vec![call("a", "readCSV")]).unwrap();
        mem.push_user("never mind");
        assert!(mem.push_tool_result("a", "late").is_err());
    }

    #[test]
    fn test_empty_and_duplicate_ids_rejected() {
        let mut mem = ConversationMemory::new("c1");
        assert_eq!(
            mem.push_tool_calls(None, vec![]).unwrap_err(),
            MemoryError::EmptyToolBatch
        );
        assert_eq!(
            mem.push_tool_calls(None, vec![call("", "readCSV")]).unwrap_err(),
            MemoryError::EmptyCorrelationId
        );
        assert_eq!(
            mem.push_tool_calls(None, vec![call("a", "readCSV"), call("a", "createChart")])
                .unwrap_err(),
            MemoryError::DuplicateCorrelationId("a".into())
        );
        assert!(mem.is_empty());
    }

    #[test]
    fn test_assistant_blocked_while_calls_pending() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_tool_calls(Some("Let me check.".into()), vec![call("a", "readCSV")])
            .unwrap();
        assert_eq!(
            mem.push_assistant("premature").unwrap_err(),
            MemoryError::PendingToolCalls(1)
        );
        assert!(mem.push_tool_calls(None, vec![call("b", "readCSV")]).is_err());
    }

    #[test]
    fn test_set_active_dataset_dedups_history() {
        let mut mem = ConversationMemory::new("c1");
        mem.set_active_dataset("Book2");
        mem.set_active_dataset("Claims2024");
        mem.set_active_dataset("Book2");
        assert_eq!(mem.last_active_dataset(), Some("Book2"));
        assert_eq!(mem.datasets(), &["Book2".to_string(), "Claims2024".to_string()]);
        assert!(mem.is_empty());
    }

    #[test]
    fn test_compaction_keeps_recent_tail() {
        let mut mem = ConversationMemory::new("c1");
        for i in 0..13 {
            mem.push_user(format!("turn {i}"));
        }
        assert!(mem.needs_compaction(12));

        mem.apply_compaction("older turns discussed claims", 6);
        assert_eq!(mem.len(), 6);
        assert_eq!(mem.summary(), "older turns discussed claims");
        assert_eq!(mem.working_messages()[0].text(), Some("turn 7"));
        assert!(!mem.needs_compaction(12));
    }

    #[test]
    fn test_compaction_drops_orphan_tool_turns() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_user("q");
        mem.push_tool_calls(None, vec![call("a", "readCSV"), call("b", "readCSV")])
            .unwrap();
        mem.push_tool_result("a", "ra").unwrap();
        mem.push_tool_result("b", "rb").unwrap();
        mem.push_assistant("answer").unwrap();

        // A tail of 3 starts at the tool results.
        mem.apply_compaction("s", 3);
        let roles: Vec<&str> = mem.working_messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["assistant"]);
    }

    #[test]
    fn test_compaction_never_empties_window() {
        let mut mem = ConversationMemory::new("c1");
        mem.push_user("only");
        mem.apply_compaction("s", 0);
        assert_eq!(mem.len(), 1);
    }
}
