//! Session pipeline errors.

use thiserror::Error;

/// Errors surfaced by the session layer to its host.
///
/// Per-message failures (malformed frame, rate limit, overload, upstream
/// or persistence trouble) never appear here — the pipeline converts
/// those to client error frames and keeps going. What remains is the
/// session-fatal set.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client connection is gone — outbound frames have nowhere to go.
    #[error("client connection closed")]
    ConnectionClosed,

    /// The session is tearing down; no further messages are accepted.
    #[error("session is shutting down")]
    ShuttingDown,

    /// History could not be loaded while (re)connecting the session.
    #[error(transparent)]
    History(#[from] relay_history::HistoryError),
}
