//! Session registry — owns every `ConversationMemory`, created lazily per id.
//!
//! Each conversation sits behind its own async mutex so a whole turn can hold
//! it across model and tool calls. Turns for different ids never contend.
//!
//! Optional durability: JSONL in `{dir}/{safe_id}-{hash}.jsonl`, where `hash`
//! is a SHA-256 prefix of the raw id so ids that sanitize alike stay apart.
//! - Line 1: `{"_type":"metadata","conversationId":"...","summary":"...","lastActiveDataset":...,"datasets":[...],"createdAt":"...","updatedAt":"..."}`
//! - Line 2+: one working turn per line (`{"role":"user","content":"..."}`)

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::memory::ConversationMemory;
use crate::types::Message;
use crate::utils;

/// Shared, lockable handle to one conversation's memory.
pub type ConversationHandle = Arc<tokio::sync::Mutex<ConversationMemory>>;

// ─────────────────────────────────────────────
// Session metadata (first line of JSONL)
// ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionMetadata {
    #[serde(rename = "_type")]
    record_type: String,
    conversation_id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    last_active_dataset: Option<String>,
    #[serde(default)]
    datasets: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────
// SessionRegistry
// ─────────────────────────────────────────────

/// Keyed store of conversation memories.
pub struct SessionRegistry {
    /// Where JSONL files live; `None` keeps memory process-local.
    sessions_dir: Option<PathBuf>,
    conversations: Mutex<HashMap<String, ConversationHandle>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// In-memory registry; nothing survives a restart.
    pub fn new() -> Self {
        Self {
            sessions_dir: None,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Registry that loads from and writes to `sessions_dir`.
    ///
    /// The directory is created if it doesn't exist.
    pub fn with_persistence(sessions_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = sessions_dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            sessions_dir: Some(dir),
            conversations: Mutex::new(HashMap::new()),
        })
    }

    /// Whether conversations are written to disk.
    pub fn is_persistent(&self) -> bool {
        self.sessions_dir.is_some()
    }

    /// Handle for `conversation_id`, creating the record on first access.
    ///
    /// 1. Check the in-memory map
    /// 2. Try to load from disk (persistent registries only)
    /// 3. Create a new empty memory
    pub fn handle(&self, conversation_id: &str) -> ConversationHandle {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = conversations.get(conversation_id) {
            return Arc::clone(handle);
        }

        let memory = self
            .load_from_disk(conversation_id)
            .unwrap_or_else(|| ConversationMemory::new(conversation_id));
        debug!(conversation = %conversation_id, "Created conversation memory");

        let handle = Arc::new(tokio::sync::Mutex::new(memory));
        conversations.insert(conversation_id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Snapshot of the memory for `conversation_id` (created if absent).
    ///
    /// Waits for any turn currently holding the conversation.
    pub async fn get(&self, conversation_id: &str) -> ConversationMemory {
        let handle = self.handle(conversation_id);
        let memory = handle.lock().await;
        memory.clone()
    }

    /// Ids of every conversation touched by this process.
    pub fn conversation_ids(&self) -> Vec<String> {
        let conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = conversations.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Write `memory` to disk. No-op for in-memory registries.
    pub fn persist(&self, memory: &ConversationMemory) -> std::io::Result<()> {
        let Some(dir) = &self.sessions_dir else {
            return Ok(());
        };
        let path = session_path(dir, memory.conversation_id());
        let mut file = std::fs::File::create(&path)?;

        let meta = SessionMetadata {
            record_type: "metadata".to_string(),
            conversation_id: memory.conversation_id().to_string(),
            summary: memory.summary.clone(),
            last_active_dataset: memory.last_active_dataset.clone(),
            datasets: memory.datasets.clone(),
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        };
        writeln!(file, "{}", serde_json::to_string(&meta)?)?;

        for msg in &memory.working_messages {
            writeln!(file, "{}", serde_json::to_string(msg)?)?;
        }

        debug!(
            "Saved conversation '{}' ({} turns) to {}",
            memory.conversation_id(),
            memory.len(),
            path.display()
        );
        Ok(())
    }

    fn load_from_disk(&self, conversation_id: &str) -> Option<ConversationMemory> {
        let dir = self.sessions_dir.as_ref()?;
        let path = session_path(dir, conversation_id);
        if !path.exists() {
            return None;
        }

        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open session file {}: {}", path.display(), e);
                return None;
            }
        };

        let mut memory = ConversationMemory::new(conversation_id);
        let mut lines = std::io::BufReader::new(file).lines();

        match lines.next() {
            Some(Ok(line)) => match serde_json::from_str::<SessionMetadata>(&line) {
                Ok(meta) if meta.record_type == "metadata" => {
                    if meta.conversation_id != conversation_id {
                        warn!(
                            "Session file {} belongs to '{}', not '{}', ignoring",
                            path.display(),
                            meta.conversation_id,
                            conversation_id
                        );
                        return None;
                    }
                    memory.summary = meta.summary;
                    memory.last_active_dataset = meta.last_active_dataset;
                    memory.datasets = meta.datasets;
                    memory.created_at = meta.created_at;
                    memory.updated_at = meta.updated_at;
                }
                _ => {
                    warn!("Session file {} has no metadata line, ignoring", path.display());
                    return None;
                }
            },
            _ => return None,
        }

        for line in lines.map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(msg) => memory.working_messages.push(msg),
                Err(e) => warn!("Skipping unreadable turn in {}: {}", path.display(), e),
            }
        }

        debug!(
            "Loaded conversation '{}' with {} turns from disk",
            conversation_id,
            memory.len()
        );
        Some(memory)
    }
}

/// Length of the id digest suffix, in hex characters.
const ID_HASH_LEN: usize = 16;

/// JSONL file path for a conversation id.
///
/// The readable prefix is lossy; the digest suffix keeps distinct ids apart.
fn session_path(dir: &Path, conversation_id: &str) -> PathBuf {
    let digest = hex::encode(Sha256::digest(conversation_id.as_bytes()));
    dir.join(format!(
        "{}-{}.jsonl",
        utils::safe_filename(conversation_id),
        &digest[..ID_HASH_LEN]
    ))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_get_creates_empty_memory() {
        let registry = SessionRegistry::new();
        let memory = registry.get("c1").await;
        assert_eq!(memory.conversation_id(), "c1");
        assert!(memory.is_empty());
        assert_eq!(registry.conversation_ids(), vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let registry = SessionRegistry::new();
        let first = registry.get("c1").await;
        let second = registry.get("c1").await;
        assert_eq!(first, second);
        assert_eq!(registry.conversation_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_shares_state() {
        let registry = SessionRegistry::new();
        registry.handle("c1").lock().await.push_user("hello");

        let memory = registry.get("c1").await;
        assert_eq!(memory.len(), 1);
        assert!(registry.get("c2").await.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_persist_is_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.is_persistent());
        let memory = registry.get("c1").await;
        registry.persist(&memory).unwrap();
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();

        {
            let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
            let handle = registry.handle("teams:42");
            let mut memory = handle.lock().await;
            memory.push_user("Total claims?");
            memory
                .push_tool_calls(None, vec![ToolCall::new("call_1", "retrieveKnowledgeBase", "{}")])
                .unwrap();
            memory.push_tool_result("call_1", "1,204").unwrap();
            memory.push_assistant("1,204 claims.").unwrap();
            memory.set_active_dataset("Book2");
            memory.apply_compaction("user asked about claims", 6);
            registry.persist(&memory).unwrap();
        }

        let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
        let memory = registry.get("teams:42").await;
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.summary(), "user asked about claims");
        assert_eq!(memory.last_active_dataset(), Some("Book2"));
        assert_eq!(memory.datasets(), &["Book2".to_string()]);
        assert!(memory.working_messages()[1].has_tool_calls());
    }

    #[tokio::test]
    async fn test_session_file_format() {
        let dir = tempdir().unwrap();
        let registry = SessionRegistry::with_persistence(dir.path()).unwrap();

        let handle = registry.handle("cli:local");
        let mut memory = handle.lock().await;
        memory.push_user("test message");
        registry.persist(&memory).unwrap();

        let path = session_path(dir.path(), "cli:local");
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("cli_local-") && n.ends_with(".jsonl")));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);

        let meta: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(meta["_type"], "metadata");
        assert_eq!(meta["conversationId"], "cli:local");
        assert!(meta.get("lastActiveDataset").is_some());

        let msg: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"], "test message");
    }

    #[tokio::test]
    async fn test_file_without_metadata_starts_fresh() {
        let dir = tempdir().unwrap();
        std::fs::write(
            session_path(dir.path(), "c1"),
            "{\"role\":\"user\",\"content\":\"stray\"}\n",
        )
        .unwrap();

        let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
        assert!(registry.get("c1").await.is_empty());
    }

    #[test]
    fn test_sanitized_alike_ids_get_distinct_files() {
        let dir = Path::new("/tmp/sessions");
        assert_ne!(session_path(dir, "team:alpha"), session_path(dir, "team_alpha"));
        assert_eq!(session_path(dir, "team:alpha"), session_path(dir, "team:alpha"));
    }

    #[tokio::test]
    async fn test_sanitized_alike_ids_stay_isolated_across_restart() {
        let dir = tempdir().unwrap();

        {
            let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
            let handle = registry.handle("team:alpha");
            let mut memory = handle.lock().await;
            memory.push_user("secret of alpha");
            memory.set_active_dataset("AlphaBook");
            registry.persist(&memory).unwrap();

            let other = registry.handle("team_alpha");
            let mut other = other.lock().await;
            other.push_user("hello from the other team");
            registry.persist(&other).unwrap();
        }

        let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
        let alpha = registry.get("team:alpha").await;
        let other = registry.get("team_alpha").await;
        assert_eq!(alpha.working_messages(), &[Message::user("secret of alpha")]);
        assert_eq!(alpha.last_active_dataset(), Some("AlphaBook"));
        assert_eq!(other.working_messages(), &[Message::user("hello from the other team")]);
        assert_eq!(other.last_active_dataset(), None);
    }

    #[tokio::test]
    async fn test_file_owned_by_another_id_is_ignored() {
        let dir = tempdir().unwrap();
        {
            let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
            let handle = registry.handle("team:alpha");
            let mut memory = handle.lock().await;
            memory.push_user("secret of alpha");
            registry.persist(&memory).unwrap();
        }
        std::fs::rename(
            session_path(dir.path(), "team:alpha"),
            session_path(dir.path(), "team_alpha"),
        )
        .unwrap();

        let registry = SessionRegistry::with_persistence(dir.path()).unwrap();
        assert!(registry.get("team_alpha").await.is_empty());
    }
}
