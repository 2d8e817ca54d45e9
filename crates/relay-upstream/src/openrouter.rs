//! OpenRouter provider implementing the [`ChatProvider`] trait.
//!
//! Speaks the OpenAI-style `chat/completions` SSE protocol with Bearer
//! auth. Fragments are the `choices[0].delta.content` of each chunk; the
//! stream terminates on the `[DONE]` sentinel. Undecodable chunks are
//! logged and skipped rather than failing the stream.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use metrics::counter;
use relay_core::turns::Turn;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, error, instrument, warn};

use crate::provider::{ChatProvider, FragmentStream, Result, UpstreamError};
use crate::types::{ChatChunk, ChatRequest, DEFAULT_BASE_URL, messages_from_history};

/// End-of-stream sentinel in the SSE data field.
const DONE_SENTINEL: &str = "[DONE]";

/// OpenRouter provider configuration.
#[derive(Clone, Debug, Default)]
pub struct OpenRouterConfig {
    /// API base URL. `None` uses the public endpoint.
    pub base_url: Option<String>,
    /// Bearer token. `None` sends unauthenticated requests (test servers).
    pub api_key: Option<String>,
}

/// OpenRouter LLM provider.
pub struct OpenRouterProvider {
    config: OpenRouterConfig,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(config: OpenRouterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: OpenRouterConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build HTTP headers for the request.
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.config.api_key {
            let auth_value = format!("Bearer {api_key}");
            let _ = headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| UpstreamError::Transport(format!("invalid API key header: {e}")))?,
            );
        }
        Ok(headers)
    }

    /// Build the request body.
    fn build_request(history: &[Turn], model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: messages_from_history(history),
            stream: true,
        }
    }

    /// Map a non-success HTTP status to an error.
    fn classify_status(status: u16, body: &str, model: &str) -> UpstreamError {
        match status {
            429 => UpstreamError::RateLimited {
                message: if body.is_empty() {
                    "too many requests".into()
                } else {
                    body.to_string()
                },
            },
            400 | 404 if body.contains("model") => UpstreamError::InvalidModel {
                model: model.to_string(),
            },
            _ => UpstreamError::Provider {
                status,
                message: body.to_string(),
            },
        }
    }

    async fn stream_internal(&self, history: &[Turn], model: &str) -> Result<FragmentStream> {
        let request = Self::build_request(history, model);
        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base_url}/chat/completions");
        let headers = self.build_headers()?;

        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            "sending completion request"
        );
        counter!("upstream_requests_total", "provider" => "openrouter").increment(1);

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::classify_status(status.as_u16(), &body, model);
            error!(status = status.as_u16(), kind = err.kind(), "upstream request rejected");
            counter!("upstream_errors_total", "kind" => err.kind()).increment(1);
            return Err(err);
        }

        let mut events = response.bytes_stream().eventsource();
        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data == DONE_SENTINEL {
                            break;
                        }
                        match serde_json::from_str::<ChatChunk>(&event.data) {
                            Ok(chunk) => {
                                if let Some(text) = chunk.into_text() {
                                    yield Ok(text);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "skipping undecodable stream chunk");
                            }
                        }
                    }
                    Err(e) => {
                        counter!("upstream_errors_total", "kind" => "transport").increment(1);
                        yield Err(UpstreamError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        }))
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    #[instrument(skip_all, fields(provider = "openrouter", model))]
    async fn stream(&self, history: &[Turn], model: &str) -> Result<FragmentStream> {
        debug!(turn_count = history.len(), "starting stream");
        self.stream_internal(history, model).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenRouterProvider {
        OpenRouterProvider::new(OpenRouterConfig {
            base_url: Some(server.uri()),
            api_key: Some("test-key".into()),
        })
    }

    fn sse_body(chunks: &[&str]) -> String {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str("data: ");
            body.push_str(chunk);
            body.push_str("\n\n");
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<String>> {
        stream.collect().await
    }

    // ── Request building ────────────────────────────────────────────────

    #[test]
    fn build_request_excludes_failed_turns() {
        let history = vec![Turn::user("hi"), Turn::failed_assistant("p", "timeout")];
        let request = OpenRouterProvider::build_request(&history, "m1");
        assert_eq!(request.messages.len(), 1);
        assert!(request.stream);
    }

    #[test]
    fn headers_carry_bearer_auth() {
        let provider = OpenRouterProvider::new(OpenRouterConfig {
            base_url: None,
            api_key: Some("sk-abc".into()),
        });
        let headers = provider.build_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-abc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn headers_without_key_have_no_auth() {
        let provider = OpenRouterProvider::new(OpenRouterConfig::default());
        let headers = provider.build_headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    // ── Status classification ───────────────────────────────────────────

    #[test]
    fn status_429_is_rate_limited() {
        assert_matches!(
            OpenRouterProvider::classify_status(429, "slow down", "m1"),
            UpstreamError::RateLimited { .. }
        );
    }

    #[test]
    fn status_404_naming_model_is_invalid_model() {
        assert_matches!(
            OpenRouterProvider::classify_status(404, r#"{"error": "model not found"}"#, "m1"),
            UpstreamError::InvalidModel { model } if model == "m1"
        );
    }

    #[test]
    fn other_statuses_are_provider_errors() {
        assert_matches!(
            OpenRouterProvider::classify_status(500, "boom", "m1"),
            UpstreamError::Provider { status: 500, .. }
        );
    }

    // ── Streaming ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn yields_fragments_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "m1",
                "stream": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[
                    r#"{"choices": [{"delta": {"content": "He"}}]}"#,
                    r#"{"choices": [{"delta": {"content": "llo!"}}]}"#,
                ]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stream = provider.stream(&[Turn::user("hello")], "m1").await.unwrap();
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(fragments, vec!["He", "llo!"]);
    }

    #[tokio::test]
    async fn undecodable_chunks_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[
                    r#"{"choices": [{"delta": {"content": "ok"}}]}"#,
                    "not json at all",
                    r#"{"choices": [{"delta": {"content": "fine"}}]}"#,
                ]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stream = provider.stream(&[Turn::user("x")], "m1").await.unwrap();
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(fragments, vec!["ok", "fine"]);
    }

    #[tokio::test]
    async fn role_only_chunks_yield_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"{"choices": [{"delta": {"role": "assistant"}}]}"#]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stream = provider.stream(&[Turn::user("x")], "m1").await.unwrap();
        assert!(collect(stream).await.is_empty());
    }

    #[tokio::test]
    async fn status_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too fast"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.stream(&[Turn::user("x")], "m1").await.err().unwrap();
        assert_eq!(err.kind(), "rate_limited");
    }

    #[tokio::test]
    async fn status_500_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("exploded"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.stream(&[Turn::user("x")], "m1").await.err().unwrap();
        assert_matches!(err, UpstreamError::Provider { status: 500, .. });
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        // Port 1 is never listening.
        let provider = OpenRouterProvider::new(OpenRouterConfig {
            base_url: Some("http://127.0.0.1:1".into()),
            api_key: None,
        });
        let err = provider.stream(&[Turn::user("x")], "m1").await.err().unwrap();
        assert_eq!(err.kind(), "transport");
    }
}
