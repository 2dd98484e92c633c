//! Error types for planner-core

use thiserror::Error;

/// Result type alias using planner-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in planner-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input (malformed document, checkpoint or batch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Collection name not served by this backend
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller gave up before the operation finished
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns true if the caller should retry the whole pull/push call.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_) | Self::Cancelled)
    }

    /// Returns true if the error was caused by the request itself.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnknownCollection(_))
    }
}
