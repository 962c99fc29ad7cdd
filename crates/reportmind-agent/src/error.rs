//! Error taxonomy of a turn.
//!
//! Tool failures are contained: they become diagnostic `tool` turns and the
//! turn carries on. Ingestion, model and memory failures end the turn and are
//! surfaced to the user through [`TurnError::user_message`].

use std::fmt;

use reportmind_core::MemoryError;
use reportmind_providers::ProviderError;
use thiserror::Error;

/// Which model call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelPhase {
    Decision,
    Finalize,
    Summarize,
}

impl fmt::Display for ModelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelPhase::Decision => "decision",
            ModelPhase::Finalize => "finalize",
            ModelPhase::Summarize => "summarize",
        })
    }
}

/// A model call that produced nothing usable.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("{phase} call failed: {source}")]
    Provider {
        phase: ModelPhase,
        #[source]
        source: ProviderError,
    },

    #[error("decision returned neither text nor tool calls")]
    EmptyDecision,

    #[error("{0} call returned no text")]
    EmptyCompletion(ModelPhase),
}

impl ModelCallError {
    pub fn phase(&self) -> ModelPhase {
        match self {
            ModelCallError::Provider { phase, .. } => *phase,
            ModelCallError::EmptyDecision => ModelPhase::Decision,
            ModelCallError::EmptyCompletion(phase) => *phase,
        }
    }
}

/// Why a single tool invocation failed. Rendered into the `tool` turn.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolFailure {
    #[error("tool '{0}' is not available")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    MalformedArguments { tool: String, reason: String },

    #[error("{tool} failed: {reason}")]
    Execution { tool: String, reason: String },

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolFailure {
    /// Diagnostic text handed to the model as the tool turn content.
    pub fn diagnostic(&self) -> String {
        format!("Error: {self}")
    }
}

/// Retrieving or processing an uploaded dataset failed.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("no download URL found for the attachment")]
    MissingReference,

    #[error("download failed: {0}")]
    Download(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Processing(String),

    #[error("could not store the file: {0}")]
    Storage(#[from] std::io::Error),
}

/// A failure that ends the current turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Model(#[from] ModelCallError),

    #[error("conversation memory rejected a turn: {0}")]
    Memory(#[from] MemoryError),
}

impl TurnError {
    /// Notice shown to the user when the turn is aborted.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Ingestion(e) => format!("❌ Error processing file: {e}"),
            TurnError::Model(_) | TurnError::Memory(_) => {
                "Sorry, I couldn't complete that request right now. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_diagnostic() {
        let failure = ToolFailure::Timeout {
            tool: "readCSV".into(),
            secs: 120,
        };
        assert_eq!(failure.diagnostic(), "Error: readCSV did not finish within 120s");
    }

    #[test]
    fn test_model_error_phase() {
        let err = ModelCallError::Provider {
            phase: ModelPhase::Finalize,
            source: ProviderError::EmptyChoices,
        };
        assert_eq!(err.phase(), ModelPhase::Finalize);
        assert!(err.to_string().starts_with("finalize call failed"));
        assert_eq!(ModelCallError::EmptyDecision.phase(), ModelPhase::Decision);
        assert_eq!(
            ModelCallError::EmptyCompletion(ModelPhase::Summarize).to_string(),
            "summarize call returned no text"
        );
    }

    #[test]
    fn test_user_messages() {
        let ingest: TurnError = IngestionError::Download("HTTP 404".into()).into();
        assert_eq!(
            ingest.user_message(),
            "❌ Error processing file: download failed: HTTP 404"
        );

        let model: TurnError = ModelCallError::EmptyDecision.into();
        assert!(model.user_message().starts_with("Sorry"));
    }
}
