//! Centralized error types for Paperflow.

use thiserror::Error;

/// Main error type for Paperflow operations.
#[derive(Error, Debug)]
pub enum PaperflowError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    #[error("Channel is not running")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Paperflow operations.
pub type PaperflowResult<T> = Result<T, PaperflowError>;

impl PaperflowError {
    /// Create a transport error from any displayable cause.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}
