//! Provider clients.
//!
//! `ChatProvider` is the seam the orchestrator talks through. The production
//! implementation, `HttpChatProvider`, speaks either the OpenAI Chat
//! Completions API or the Anthropic Messages API over reqwest.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::claude;
use super::config::{ChatConfig, ProviderKind};
use super::errors::InferenceError;
use super::openai;
use super::streaming::parse_text_stream;
use super::types::{ChatRequest, ProviderReply};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Provider Trait ──────────────────────────────────────────────────────────

/// Ordered text deltas of a streaming reply.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, InferenceError>> + Send>>;

/// One LLM provider endpoint.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one request and return the parsed reply (text or tool calls).
    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, InferenceError>;

    /// Send one request with streaming enabled. Tools are never offered on
    /// this path.
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, InferenceError>;
}

// ─── HttpChatProvider ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(untagged)]
enum RequestBody {
    OpenAi(openai::ChatCompletionRequest),
    Claude(claude::MessagesRequest),
}

impl RequestBody {
    fn message_count(&self) -> usize {
        match self {
            RequestBody::OpenAi(b) => b.messages.len(),
            RequestBody::Claude(b) => b.messages.len(),
        }
    }

    fn tool_count(&self) -> usize {
        match self {
            RequestBody::OpenAi(b) => b.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            RequestBody::Claude(b) => b.tools.as_ref().map(|t| t.len()).unwrap_or(0),
        }
    }
}

/// reqwest-backed provider for OpenAI- and Claude-style endpoints.
pub struct HttpChatProvider {
    /// HTTP client for non-streaming requests.
    http: HttpClient,
    /// HTTP client for streaming requests (longer total timeout).
    http_stream: HttpClient,
    kind: ProviderKind,
    base_url: String,
    api_key: SecretString,
    request_timeout_secs: u64,
    stream_timeout_secs: u64,
}

impl HttpChatProvider {
    /// Build a provider for `config`. Does not check connectivity.
    pub fn new(config: &ChatConfig, api_key: &str) -> Result<Self, InferenceError> {
        config.validate()?;
        if api_key.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "API key is empty".into(),
            });
        }

        let base_url = config.effective_base_url().to_string();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.stream_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: base_url.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            kind: config.provider,
            base_url,
            api_key: SecretString::new(api_key.trim().to_string()),
            request_timeout_secs: config.request_timeout_secs,
            stream_timeout_secs: config.stream_timeout_secs,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::OpenAi => format!("{}/chat/completions", self.base_url),
            ProviderKind::Claude => format!("{}/v1/messages", self.base_url),
        }
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> RequestBody {
        match self.kind {
            ProviderKind::OpenAi => RequestBody::OpenAi(openai::build_request(request, stream)),
            ProviderKind::Claude => RequestBody::Claude(claude::build_request(request, stream)),
        }
    }

    /// POST the request and return the response once the status is 2xx.
    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = self.endpoint();
        let body = self.body(request, stream);

        // Log the request metadata, never the body or the key.
        tracing::info!(
            url = %url,
            provider = %self.kind,
            model = %request.model,
            message_count = body.message_count(),
            tool_count = body.tool_count(),
            max_tokens = request.max_tokens,
            stream,
            "=== LLM REQUEST ==="
        );

        let (client, timeout_secs) = if stream {
            (&self.http_stream, self.stream_timeout_secs)
        } else {
            (&self.http, self.request_timeout_secs)
        };

        let mut builder = client.post(&url).json(&body);
        builder = match self.kind {
            ProviderKind::OpenAi => builder.bearer_auth(self.api_key.expose_secret()),
            ProviderKind::Claude => builder
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", claude::API_VERSION),
        };
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, &url, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), body = %body, "provider returned error status");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, InferenceError> {
        let url = self.endpoint();
        let response = self.send(request, false).await?;
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, &url, self.request_timeout_secs))?;

        let reply = match self.kind {
            ProviderKind::OpenAi => openai::parse_response(&text)?,
            ProviderKind::Claude => claude::parse_response(&text)?,
        };

        tracing::info!(
            provider = %self.kind,
            text_len = reply.text.as_ref().map(|t| t.len()).unwrap_or(0),
            tool_calls = reply.tool_calls.len(),
            stop_reason = ?reply.stop_reason,
            "=== LLM RESPONSE ==="
        );

        Ok(reply)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, InferenceError> {
        let mut request = request.clone();
        request.tools.clear();
        let response = self.send(&request, true).await?;
        Ok(Box::pin(parse_text_stream(response.bytes_stream(), self.kind)))
    }
}

// ─── Error Mapping ───────────────────────────────────────────────────────────

/// Map a reqwest failure onto the transport-level error variants.
fn transport_error(e: reqwest::Error, url: &str, timeout_secs: u64) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout {
            duration_secs: timeout_secs,
        }
    } else if e.is_connect() {
        let reason = error_chain(&e);
        if looks_like_dns_failure(&reason) {
            InferenceError::HostUnresolved {
                endpoint: url.to_string(),
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason,
            }
        }
    } else if e.is_decode() || e.is_body() {
        InferenceError::StreamError {
            reason: error_chain(&e),
        }
    } else {
        InferenceError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: error_chain(&e),
        }
    }
}

/// reqwest hides the interesting part (DNS, TLS) in the source chain.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

fn looks_like_dns_failure(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("nodename nor servname")
        || lower.contains("no such host")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
