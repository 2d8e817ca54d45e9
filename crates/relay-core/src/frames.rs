//! Client wire contract.
//!
//! Inbound: a structured request carrying the message text and an optional
//! model override. Outbound: internally tagged frames carrying either an
//! incremental text fragment, a terminal `done` marker, or an error with a
//! kind and human-readable detail.

use serde::{Deserialize, Serialize};

/// A chat request received from the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    /// The user's message text.
    pub message: String,
    /// Model identifier override. Falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl InboundFrame {
    /// Parse a raw text payload into a frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Client-visible error taxonomy.
///
/// Every per-message failure surfaces to the client as exactly one of
/// these kinds; the accompanying detail string is human-readable and
/// carries no stability guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The client sent a frame that does not parse into [`InboundFrame`].
    MalformedRequest,
    /// The session's token bucket denied admission.
    RateLimited,
    /// The session's message queue is full.
    Overloaded,
    /// The upstream provider call failed; detail names the failure kind.
    Upstream,
    /// The exchange could not be durably recorded.
    Persistence,
}

impl ErrorKind {
    /// Stable snake_case label, as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// A frame sent to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// An incremental piece of the response text.
    Fragment {
        /// Fragment text, relayed as it arrived from upstream.
        text: String,
    },
    /// The response completed normally.
    Done,
    /// The request failed.
    Error {
        /// Which failure class occurred.
        kind: ErrorKind,
        /// Human-readable description.
        detail: String,
    },
}

impl OutboundFrame {
    /// Build an error frame.
    #[must_use]
    pub fn error(kind: ErrorKind, detail: impl Into<String>) -> Self {
        OutboundFrame::Error {
            kind,
            detail: detail.into(),
        }
    }

    /// Build a fragment frame.
    #[must_use]
    pub fn fragment(text: impl Into<String>) -> Self {
        OutboundFrame::Fragment { text: text.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── InboundFrame ─────────────────────────────────────────────────────

    #[test]
    fn parse_message_with_model() {
        let frame = InboundFrame::parse(r#"{"message": "hello", "model": "m1"}"#).unwrap();
        assert_eq!(frame.message, "hello");
        assert_eq!(frame.model.as_deref(), Some("m1"));
    }

    #[test]
    fn parse_message_without_model() {
        let frame = InboundFrame::parse(r#"{"message": "hello"}"#).unwrap();
        assert_eq!(frame.message, "hello");
        assert!(frame.model.is_none());
    }

    #[test]
    fn parse_rejects_missing_message() {
        assert!(InboundFrame::parse(r#"{"model": "m1"}"#).is_err());
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(InboundFrame::parse("not json").is_err());
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let frame = InboundFrame::parse(r#"{"message": "hi", "temperature": 0.7}"#).unwrap();
        assert_eq!(frame.message, "hi");
    }

    // ── OutboundFrame ────────────────────────────────────────────────────

    #[test]
    fn fragment_frame_shape() {
        let json = serde_json::to_value(OutboundFrame::fragment("He")).unwrap();
        assert_eq!(json, json!({"type": "fragment", "text": "He"}));
    }

    #[test]
    fn done_frame_shape() {
        let json = serde_json::to_value(OutboundFrame::Done).unwrap();
        assert_eq!(json, json!({"type": "done"}));
    }

    #[test]
    fn error_frame_shape() {
        let json =
            serde_json::to_value(OutboundFrame::error(ErrorKind::RateLimited, "slow down")).unwrap();
        assert_eq!(
            json,
            json!({"type": "error", "kind": "rate_limited", "detail": "slow down"})
        );
    }

    #[test]
    fn outbound_serde_roundtrip() {
        for frame in [
            OutboundFrame::fragment("x"),
            OutboundFrame::Done,
            OutboundFrame::error(ErrorKind::Overloaded, "queue full"),
        ] {
            let json = serde_json::to_string(&frame).unwrap();
            let back: OutboundFrame = serde_json::from_str(&json).unwrap();
            assert_eq!(frame, back);
        }
    }

    // ── ErrorKind ────────────────────────────────────────────────────────

    #[test]
    fn error_kind_labels_are_snake_case() {
        let kinds = [
            ErrorKind::MalformedRequest,
            ErrorKind::RateLimited,
            ErrorKind::Overloaded,
            ErrorKind::Upstream,
            ErrorKind::Persistence,
        ];
        for kind in kinds {
            assert!(
                kind.as_str()
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_'),
                "label '{}' must be snake_case",
                kind.as_str()
            );
        }
    }

    #[test]
    fn error_kind_as_str_matches_serde() {
        let json = serde_json::to_value(ErrorKind::MalformedRequest).unwrap();
        assert_eq!(json, ErrorKind::MalformedRequest.as_str());
    }
}
