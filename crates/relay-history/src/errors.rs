//! History errors.

use thiserror::Error;

/// Result alias for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors raised by the persistence gateway.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// SQLite-level failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool failure.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored row could not be mapped back to a turn.
    #[error("corrupt history row: {0}")]
    Corrupt(String),

    /// Internal failure (blocking task panicked or was cancelled).
    #[error("internal history error: {0}")]
    Internal(String),
}
