//! # relay-upstream
//!
//! Streaming LLM provider client for the relay service.
//!
//! The seam is [`ChatProvider`]: one call carries the full conversation
//! history plus a model identifier and returns a [`FragmentStream`] — a
//! finite, non-restartable sequence of response text fragments. Dropping
//! the stream cancels the underlying HTTP request, so abandoning a call
//! releases its network resources without further ceremony.
//!
//! [`OpenRouterProvider`] is the shipped implementation, speaking the
//! OpenAI-style `chat/completions` SSE protocol.

#![deny(unsafe_code)]

pub mod openrouter;
pub mod provider;
pub mod types;

pub use openrouter::{OpenRouterConfig, OpenRouterProvider};
pub use provider::{ChatProvider, FragmentStream, Result, UpstreamError};
