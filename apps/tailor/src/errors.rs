use std::time::Duration;

use thiserror::Error;

use crate::llm_client::LlmError;

/// Per-section failure. Captured into a `SectionResult` by the executor and
/// never propagated across task boundaries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Source data missing: {0}")]
    SourceDataMissing(String),

    #[error("Malformed source data: {0}")]
    MalformedSource(String),

    #[error("Generation task panicked: {0}")]
    TaskPanicked(String),
}

impl GenerationError {
    /// Missing or malformed source data fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            GenerationError::SourceDataMissing(_) | GenerationError::MalformedSource(_)
        )
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            // The model answered, but not in the shape we asked for.
            LlmError::Parse(e) => GenerationError::Validation(format!("Unparseable output: {e}")),
            LlmError::EmptyContent => {
                GenerationError::Validation("LLM returned empty content".to_string())
            }
            other => GenerationError::Transport(other.to_string()),
        }
    }
}

/// Content cache failure. Never fatal: callers log it and carry on as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Hard failure surfaced to the caller of the controller.
/// Only the legacy path (the last line of defense) produces these.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No source material to build a document from: {0}")]
    SourceDataMissing(String),

    #[error("Legacy generation failed: {0}")]
    SystemFailure(String),
}
