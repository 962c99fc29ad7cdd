//! Compaction policy — folds old turns into the summary once the working
//! window grows past the threshold.

use tracing::info;

use reportmind_core::config::CompactionConfig;
use reportmind_core::ConversationMemory;

use crate::error::ModelCallError;
use crate::gateway::ModelGateway;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Compact once the window holds more turns than this.
    pub threshold: usize,
    /// Turns kept after compaction.
    pub keep_recent: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::from_config(&CompactionConfig::default())
    }
}

impl CompactionPolicy {
    pub fn from_config(config: &CompactionConfig) -> Self {
        Self {
            threshold: config.threshold,
            keep_recent: config.keep_recent.max(1),
        }
    }

    /// Whether `memory` is due. Never true while tool results are outstanding.
    pub fn is_due(&self, memory: &ConversationMemory) -> bool {
        memory.needs_compaction(self.threshold) && memory.pending_tool_calls().is_empty()
    }

    /// Summarize the whole window (prior summary included) and trim it.
    ///
    /// Returns whether compaction happened. On failure memory is untouched.
    pub async fn apply(
        &self,
        gateway: &ModelGateway,
        memory: &mut ConversationMemory,
    ) -> Result<bool, ModelCallError> {
        if !self.is_due(memory) {
            return Ok(false);
        }

        let before = memory.len();
        let summary = gateway
            .summarize(memory.summary(), memory.working_messages())
            .await?;
        memory.apply_compaction(summary, self.keep_recent);

        info!(
            conversation = %memory.conversation_id(),
            before,
            after = memory.len(),
            "compacted working memory"
        );
        Ok(true)
    }
}
