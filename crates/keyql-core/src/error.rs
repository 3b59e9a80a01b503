//! Error types for keyql

use thiserror::Error;

/// Core error type for keyql operations
#[derive(Error, Debug)]
pub enum KeyqlError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Schema discovery failed for table '{table}': {source}")]
    Discovery {
        table: String,
        #[source]
        source: Box<KeyqlError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyqlError {
    /// Wrap an error as the fatal discovery failure for `table`.
    pub fn discovery(table: impl Into<String>, source: KeyqlError) -> Self {
        KeyqlError::Discovery {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// Whether the discovery fallback chain may absorb this error.
    ///
    /// Backing-store failures (I/O against the store, missing tables,
    /// client timeouts) are expected and recoverable. Everything else
    /// signals a broken collaborator or a cancelled caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KeyqlError::Store(_) | KeyqlError::TableNotFound(_) | KeyqlError::Timeout(_)
        )
    }
}

/// Result type alias for keyql operations
pub type Result<T> = std::result::Result<T, KeyqlError>;
