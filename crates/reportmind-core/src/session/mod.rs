//! Conversation memory and the registry that owns it.
//!
//! One `ConversationMemory` per conversation id, created on first access and
//! kept for the process lifetime (optionally mirrored to JSONL on disk).

pub mod memory;
pub mod registry;

pub use memory::ConversationMemory;
pub use registry::{ConversationHandle, SessionRegistry};
