//! Scripted provider for tests and offline demos.
//!
//! Replies are queued up front and consumed in order. Every request is
//! recorded so tests can assert on what the orchestrator sent.
//!
//! ```ignore
//! let provider = ScriptedProvider::new()
//!     .with_tool_calls(vec![ToolCall::new("call_1", "create_event", args)])
//!     .with_text("Lunch is booked.");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream;

use super::client::{ChatProvider, TextStream};
use super::errors::InferenceError;
use super::types::{ChatRequest, ParsedToolCall, ProviderReply, ToolCall};

/// A failure to inject in place of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedError {
    Status { status: u16, body: String },
    Timeout,
    ConnectionLost,
}

impl From<ScriptedError> for InferenceError {
    fn from(err: ScriptedError) -> Self {
        match err {
            ScriptedError::Status { status, body } => InferenceError::HttpError { status, body },
            ScriptedError::Timeout => InferenceError::Timeout { duration_secs: 60 },
            ScriptedError::ConnectionLost => InferenceError::ConnectionFailed {
                endpoint: "mock://provider".into(),
                reason: "The network connection was lost.".into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(ProviderReply),
    Error(ScriptedError),
}

#[derive(Debug, Clone)]
struct StreamScript {
    chunks: Vec<String>,
    /// Error yielded after the chunks, if any.
    error: Option<ScriptedError>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Provider that replays queued replies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Scripted>>>,
    streams: Arc<Mutex<VecDeque<StreamScript>>>,
    /// Returned once the queue is exhausted.
    fallback: Option<ProviderReply>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text final answer.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(ProviderReply::text(text))
    }

    /// Queue a reply requesting tool calls.
    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.with_reply(ProviderReply::tool_calls(calls))
    }

    /// Queue a reply containing already-parsed calls (including malformed ones).
    pub fn with_parsed_calls(self, calls: Vec<ParsedToolCall>) -> Self {
        self.with_reply(ProviderReply {
            tool_calls: calls,
            ..ProviderReply::default()
        })
    }

    pub fn with_reply(self, reply: ProviderReply) -> Self {
        lock(&self.replies).push_back(Scripted::Reply(reply));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: ScriptedError) -> Self {
        lock(&self.replies).push_back(Scripted::Error(error));
        self
    }

    /// Reply returned for every request after the queue runs dry.
    pub fn repeating(mut self, reply: ProviderReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Queue a streaming reply.
    pub fn with_stream(self, chunks: &[&str]) -> Self {
        lock(&self.streams).push_back(StreamScript {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: None,
        });
        self
    }

    /// Queue a streaming reply that fails after the given chunks.
    pub fn with_failing_stream(self, chunks: &[&str], error: ScriptedError) -> Self {
        lock(&self.streams).push_back(StreamScript {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: Some(error),
        });
        self
    }

    /// Number of requests received (complete + stream).
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// All recorded requests.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn record(&self, request: &ChatRequest) {
        lock(&self.requests).push(request.clone());
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, InferenceError> {
        self.record(request);
        let next = lock(&self.replies).pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Error(err)) => Err(err.into()),
            None => self.fallback.clone().ok_or(InferenceError::MalformedResponse {
                reason: "no scripted reply left".into(),
            }),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, InferenceError> {
        self.record(request);
        let script = lock(&self.streams)
            .pop_front()
            .ok_or(InferenceError::MalformedResponse {
                reason: "no scripted stream left".into(),
            })?;

        let mut items: Vec<Result<String, InferenceError>> =
            script.chunks.into_iter().map(Ok).collect();
        if let Some(err) = script.error {
            items.push(Err(err.into()));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::ChatMessage;
    use futures::StreamExt;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "mock".into(),
            system_prompt: None,
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            max_tokens: 16,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_replies_in_order_then_fallback() {
        let provider = ScriptedProvider::new()
            .with_text("one")
            .with_error(ScriptedError::Status {
                status: 429,
                body: "slow down".into(),
            })
            .repeating(ProviderReply::text("again"));

        assert_eq!(provider.complete(&request()).await.unwrap().text.as_deref(), Some("one"));
        assert_eq!(provider.complete(&request()).await.unwrap_err().status(), Some(429));
        assert_eq!(provider.complete(&request()).await.unwrap().text.as_deref(), Some("again"));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_errors() {
        let provider = ScriptedProvider::new();
        assert!(provider.complete(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_script() {
        let provider = ScriptedProvider::new()
            .with_failing_stream(&["a", "b"], ScriptedError::ConnectionLost);
        let items: Vec<_> = provider.stream(&request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_ref().unwrap(), "b");
        assert!(items[2].is_err());
    }
}
