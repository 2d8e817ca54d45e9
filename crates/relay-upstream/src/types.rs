//! Wire types for the OpenAI-style streaming chat completions protocol.

use relay_core::turns::Turn;
use serde::{Deserialize, Serialize};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Outgoing completion request.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Full conversation context.
    pub messages: Vec<ChatMessage>,
    /// Always true — this client only streams.
    pub stream: bool,
}

/// One message in the request context.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Convert history turns into request messages.
///
/// Turns carrying a failure marker are excluded: a preserved partial is
/// history for the client, not context for the model.
#[must_use]
pub fn messages_from_history(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|turn| !turn.is_failed())
        .map(|turn| ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        })
        .collect()
}

/// One decoded SSE chunk.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    /// Parallel completion choices; this client only reads the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice within a chunk.
#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content delta.
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// The delta payload of a chunk choice.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// New response text, when this chunk carries any.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Extract the text delta, if this chunk carries one.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
