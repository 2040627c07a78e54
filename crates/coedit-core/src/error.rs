//! Error types for coedit core

use thiserror::Error;

/// Result type alias using coedit Error
pub type Result<T> = std::result::Result<T, Error>;

/// coedit error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// True when the caller supplied something unusable (unknown session,
    /// bad configuration) rather than the engine or workspace failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::SessionNotFound(_) | Error::Config(_))
    }
}
