//! ReportMind Agent — the orchestration core.
//!
//! This crate contains:
//! - **tools**: Tool trait, registry (the executor bridge) and the report tools
//! - **context**: Prompt assembly
//! - **gateway**: Decision, finalization and summarization model calls
//! - **compaction**: Working-window compaction policy
//! - **attachments**: Dataset download and bearer token cache
//! - **agent_loop**: The per-turn state machine

pub mod agent_loop;
pub mod attachments;
pub mod compaction;
pub mod context;
pub mod error;
pub mod gateway;
pub mod tools;

pub use agent_loop::{Orchestrator, TurnOutcome};
pub use attachments::{AttachmentFetcher, TokenCache};
pub use compaction::CompactionPolicy;
pub use context::{PromptAssembler, DEFAULT_SYSTEM_PROMPT};
pub use error::{IngestionError, ModelCallError, ModelPhase, ToolFailure, TurnError};
pub use gateway::{Decision, ModelGateway, TextToolCallPolicy};
pub use tools::{default_registry, Tool, ToolInvocationRequest, ToolInvocationResult, ToolOutput, ToolRegistry};
