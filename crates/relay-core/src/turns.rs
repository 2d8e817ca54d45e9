//! Conversation turns.
//!
//! A [`Turn`] is one entry in a session's history: who spoke, what they
//! said, and — for assistant turns that did not complete — an error
//! marker naming the failure. The marker is what distinguishes a partial
//! response preserved after an upstream failure from a completed one.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The connected client.
    User,
    /// The upstream model.
    Assistant,
}

impl Role {
    /// Stable string form, used for storage and wire payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse from the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// Turn text. May be a partial response when `error` is set.
    pub content: String,
    /// Failure marker: the upstream error kind that cut this turn short.
    /// `None` for turns that completed normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Turn {
    /// A completed user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            error: None,
        }
    }

    /// A completed assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            error: None,
        }
    }

    /// An assistant turn that failed mid-stream, keeping the partial text.
    #[must_use]
    pub fn failed_assistant(partial: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: partial.into(),
            error: Some(error.into()),
        }
    }

    /// Whether this turn carries a failure marker.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
