//! ReportMind core — shared types, message bus, configuration, and
//! conversation memory.

pub mod bus;
pub mod config;
pub mod error;
pub mod session;
pub mod types;
pub mod utils;

pub use error::MemoryError;
pub use session::{ConversationHandle, ConversationMemory, SessionRegistry};
