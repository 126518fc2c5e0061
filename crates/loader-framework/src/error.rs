//! Error types for the load orchestration engine.

use thiserror::Error;

/// Errors raised by a [`crate::Connection`] or [`crate::Connector`].
///
/// These never abort a load phase on their own: the loader turns them into
/// row-level error counts. Only a failing clear is escalated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A new connection could not be established.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The connection was lost while in use.
    #[error("Connection lost: {0}")]
    Disconnected(String),

    /// A statement was rejected by the database.
    #[error("Statement error: {0}")]
    Statement(String),
}

impl ConnectionError {
    /// Whether the underlying connection is unusable after this error.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ConnectionError::Disconnected(_))
    }
}

/// Errors returned to the controller by [`crate::Loader`] operations.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Clearing a table failed; the base state is inconsistent.
    #[error("Failed to clear '{table}': {source}")]
    Clear {
        table: String,
        #[source]
        source: ConnectionError,
    },

    /// An operation was requested in a phase that does not allow it.
    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    /// A load was submitted while one of its prerequisites was still in flight.
    #[error("Cannot load '{entity}': prerequisite '{prerequisite}' has not drained")]
    DependencyNotDrained {
        entity: String,
        prerequisite: String,
    },

    /// The dependency graph is malformed.
    #[error("Dependency graph error: {0}")]
    Graph(String),

    /// A fresh connection for post-load or watermark reads could not be opened.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
