//! Error types for the Kube-Garden agent

use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Service metadata could not be resolved
    #[error("Lookup error: {0}")]
    LookupError(String),

    /// A tool gateway call failed
    #[error("Tool failure: {0}")]
    ToolFailure(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    /// An illegal run status transition was requested
    #[error("Transition error: {0}")]
    TransitionError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
