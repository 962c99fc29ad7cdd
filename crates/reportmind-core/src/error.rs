//! Errors raised by conversation memory when a turn sequence would break
//! tool-call correlation.

use thiserror::Error;

/// A rejected mutation of a conversation's working window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("tool result '{0}' does not answer a pending tool call")]
    UncorrelatedToolResult(String),

    #[error("correlation id '{0}' appears more than once in the tool-call batch")]
    DuplicateCorrelationId(String),

    #[error("tool call has an empty correlation id")]
    EmptyCorrelationId,

    #[error("{0} tool call(s) still awaiting results")]
    PendingToolCalls(usize),

    #[error("tool-call batch is empty")]
    EmptyToolBatch,
}
