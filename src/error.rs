//! Error types for the operator console

use thiserror::Error;

/// Main error type for the console
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by node: {}", .reason.as_deref().unwrap_or("no reason given"))]
    RemoteRejection { reason: Option<String> },

    #[error("Price feed unreachable: {0}")]
    FeedUnreachable(String),

    #[error("Price feed returned malformed data: {0}")]
    FeedMalformed(String),

    #[error("Console I/O error: {0}")]
    Console(#[from] std::io::Error),
}

impl ConsoleError {
    /// Errors that end the process instead of being reported and skipped
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsoleError::Config(_) | ConsoleError::Console(_))
    }

    /// Errors the session loop reports to the operator and then continues past
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    pub fn rejection(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        ConsoleError::RemoteRejection {
            reason: if reason.trim().is_empty() {
                None
            } else {
                Some(reason)
            },
        }
    }
}

/// Result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;
