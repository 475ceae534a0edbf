//! Error types for the pipeline system.

use thiserror::Error;

/// Error surfaced by a single worker's invocation of user stage logic.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("stage '{stage}' logic failed: {source}")]
    UserLogic {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("downstream queue for stage '{stage}' is closed")]
    QueueClosed { stage: String },
}

/// Pipeline-specific error types.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("stage not found: {name}")]
    StageNotFound { name: String },

    #[error("graph construction failed: {0}")]
    GraphConstructionError(String),

    #[error("stage '{stage}' did not shut down within its time budget")]
    ShutdownTimeout { stage: String },

    #[error("invalid configuration for stage '{stage}', falling back to default: {message}")]
    ConfigError { stage: String, message: String },

    #[error("generic error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
