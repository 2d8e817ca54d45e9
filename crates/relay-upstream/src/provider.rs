//! Provider trait, error taxonomy, and the fragment stream type.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use relay_core::turns::Turn;
use thiserror::Error;

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;

/// A finite sequence of response text fragments.
///
/// Not restartable. Dropping the stream cancels the underlying request and
/// releases the network connection — callers abandon a stream simply by
/// letting it go out of scope.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Upstream call failures.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The call exceeded its maximum duration.
    #[error("upstream call timed out")]
    Timeout,

    /// The provider throttled us.
    #[error("upstream rate limited: {message}")]
    RateLimited {
        /// Provider-supplied detail.
        message: String,
    },

    /// The requested model identifier was rejected.
    #[error("invalid model '{model}'")]
    InvalidModel {
        /// The rejected model identifier.
        model: String,
    },

    /// The connection failed or broke mid-stream.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Any other provider-reported failure.
    #[error("provider error (status {status}): {message}")]
    Provider {
        /// HTTP status the provider answered with.
        status: u16,
        /// Provider-supplied detail.
        message: String,
    },
}

impl UpstreamError {
    /// Stable snake_case label — used in client error frames, failure
    /// markers, and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "timeout",
            UpstreamError::RateLimited { .. } => "rate_limited",
            UpstreamError::InvalidModel { .. } => "invalid_model",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Provider { .. } => "provider",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// A streaming chat completion provider.
///
/// One call issues one request carrying the full conversation history and
/// yields the response incrementally until the provider signals completion
/// or the stream fails.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a streaming completion over `history` with the given model.
    async fn stream(&self, history: &[Turn], model: &str) -> Result<FragmentStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_snake_case() {
        let errors = [
            UpstreamError::Timeout,
            UpstreamError::RateLimited {
                message: "x".into(),
            },
            UpstreamError::InvalidModel { model: "m".into() },
            UpstreamError::Transport("x".into()),
            UpstreamError::Provider {
                status: 500,
                message: "x".into(),
            },
        ];
        for e in errors {
            assert!(
                e.kind().chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "kind '{}' must be snake_case",
                e.kind()
            );
        }
    }

    #[test]
    fn display_names_the_model() {
        let e = UpstreamError::InvalidModel {
            model: "bogus/model".into(),
        };
        assert!(e.to_string().contains("bogus/model"));
    }
}
