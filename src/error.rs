//! Error types for engine creation and session use.
//!
//! Every fallible operation in this crate returns [`SessionError`]; nothing is
//! retried or swallowed on the way to the caller.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while creating the engine, acquiring or using a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection descriptor could not be parsed or names an unsupported backend.
    #[error("invalid connection descriptor: {0}")]
    InvalidDescriptor(String),

    /// The backing store could not be opened.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] rusqlite::Error),

    /// The pool could not hand out a connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A statement failed while the session was in use or being released.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Internal failure (e.g. a checkout task that panicked or was cancelled).
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
