//! Error types for the patternpress pipeline.

use crate::clients::CollaboratorError;
use crate::store::StorageError;
use patternpress_render::RenderError;

/// Top-level error type for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// AI output missing, malformed or not matching the pattern schema.
    #[error("generation error: {0}")]
    Generation(String),

    /// Text could not be rendered.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Work queue or document store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Image host, fulfillment or storefront call failed.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("task error: {0}")]
    Join(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
