//! Streaming responder: plain chat without tools, delivered as text deltas.

use std::sync::Arc;

use futures::StreamExt;

use crate::inference::client::ChatProvider;
use crate::inference::config::ChatConfig;
use crate::inference::types::{ChatMessage, ChatRequest};

use super::errors::AgentError;
use super::orchestrator::build_system_prompt;
use super::types::ConversationMessage;

#[derive(Clone)]
pub struct StreamingResponder {
    provider: Arc<dyn ChatProvider>,
}

impl StreamingResponder {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Stream a reply to `messages`.
    ///
    /// `on_chunk` sees every non-empty text fragment in arrival order.
    /// `on_complete` is called exactly once, with the accumulated text or the
    /// failure that ended the stream. Dropping the returned future abandons
    /// the stream and skips `on_complete`.
    pub async fn stream<F, C>(
        &self,
        messages: &[ConversationMessage],
        config: &ChatConfig,
        mut on_chunk: F,
        on_complete: C,
    ) where
        F: FnMut(&str),
        C: FnOnce(Result<String, AgentError>),
    {
        let result = self.collect(messages, config, &mut on_chunk).await;
        match &result {
            Ok(text) => tracing::info!(response_len = text.len(), "stream completed"),
            Err(e) => tracing::warn!(error = %e, "stream failed"),
        }
        on_complete(result);
    }

    async fn collect<F>(
        &self,
        messages: &[ConversationMessage],
        config: &ChatConfig,
        on_chunk: &mut F,
    ) -> Result<String, AgentError>
    where
        F: FnMut(&str),
    {
        let request = ChatRequest {
            model: config.effective_model().to_string(),
            system_prompt: Some(build_system_prompt(config, false)),
            messages: messages
                .iter()
                .filter_map(ConversationMessage::to_chat_message)
                .collect::<Vec<ChatMessage>>(),
            tools: Vec::new(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        tracing::debug!(message_count = request.messages.len(), "opening reply stream");

        let mut stream = self.provider.stream(&request).await?;
        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            on_chunk(&chunk);
            full.push_str(&chunk);
        }
        Ok(full)
    }
}
