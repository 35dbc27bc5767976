//! Chat session: the one active conversation and everything a send mutates.
//!
//! The session owns the visible message list, the outstanding pending
//! actions and the progress tracker. The orchestrator only ever sees a
//! snapshot of the history, and all events it emits flow through the
//! session before reaching an optional UI observer.

use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::capabilities::registry::CapabilityRouter;
use crate::inference::client::{ChatProvider, HttpChatProvider};
use crate::inference::config::ChatConfig;
use crate::inference::types::ToolResult;

use super::errors::AgentError;
use super::orchestrator::{Orchestrator, RunOutcome};
use super::pending_actions::Resolution;
use super::progress::ProgressTracker;
use super::responder::StreamingResponder;
use super::types::{AgentEvent, ConversationMessage, PendingAction};

pub struct ChatSession {
    orchestrator: Orchestrator,
    responder: StreamingResponder,
    config: ChatConfig,
    messages: Vec<ConversationMessage>,
    pending: Vec<PendingAction>,
    /// Results of calls that ran in the batch that raised `pending`.
    executed: Vec<ToolResult>,
    tracker: ProgressTracker,
    /// Prompt of the last send that failed with a retryable error.
    retry_prompt: Option<String>,
    observer: Option<UnboundedSender<AgentEvent>>,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        router: Arc<CapabilityRouter>,
        config: ChatConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(provider.clone(), router),
            responder: StreamingResponder::new(provider),
            config,
            messages: Vec::new(),
            pending: Vec::new(),
            executed: Vec::new(),
            tracker: ProgressTracker::new(),
            retry_prompt: None,
            observer: None,
        }
    }

    /// Session talking to the configured HTTP provider.
    pub fn connect(
        config: ChatConfig,
        api_key: &str,
        router: Arc<CapabilityRouter>,
    ) -> Result<Self, AgentError> {
        let provider = HttpChatProvider::new(&config, api_key)?;
        tracing::info!(
            provider = %config.provider,
            model = %config.effective_model(),
            tool_use = config.tool_use_enabled,
            "chat session connected"
        );
        Ok(Self::new(Arc::new(provider), router, config))
    }

    /// Forward every event to `observer` as it happens.
    pub fn with_observer(mut self, observer: UnboundedSender<AgentEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Seed the conversation (e.g. restored from persistence).
    pub fn with_history(mut self, messages: Vec<ConversationMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn pending_actions(&self) -> &[PendingAction] {
        &self.pending
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ChatConfig) {
        self.config = config;
    }

    /// Whether the last failed send can be retried.
    pub fn can_retry(&self) -> bool {
        self.retry_prompt.is_some()
    }

    /// Send a user message through the orchestration loop.
    ///
    /// Refused while pending actions are outstanding. A failed send appends
    /// one assistant message with guidance text before returning the error.
    pub async fn send(&mut self, text: &str) -> Result<RunOutcome, AgentError> {
        self.ensure_no_pending()?;

        let history = self.messages.clone();
        self.messages.push(ConversationMessage::user(text));
        self.retry_prompt = None;
        self.tracker.reset();
        self.tracker.loading_tools();

        let (tx, mut rx) = unbounded_channel();
        let orchestrator = &self.orchestrator;
        let config = &self.config;
        let tracker = &mut self.tracker;
        let observer = self.observer.as_ref();

        let run = async move {
            let outcome = orchestrator.run(text, &history, config, &tx).await;
            drop(tx);
            outcome
        };
        let pump = async {
            while let Some(event) = rx.recv().await {
                if let AgentEvent::Progress(progress) = &event {
                    tracker.apply(progress);
                }
                if let Some(observer) = observer {
                    let _ = observer.send(event);
                }
            }
        };
        let (outcome, ()) = tokio::join!(run, pump);

        match outcome {
            Ok(RunOutcome::Answer { text: answer, iterations }) => {
                tracing::info!(iterations, "send answered");
                self.messages.push(ConversationMessage::assistant(answer.clone()));
                Ok(RunOutcome::Answer {
                    text: answer,
                    iterations,
                })
            }
            Ok(RunOutcome::AwaitingConfirmation {
                pending,
                executed,
                iterations,
            }) => {
                self.pending = pending.clone();
                self.executed = executed.clone();
                Ok(RunOutcome::AwaitingConfirmation {
                    pending,
                    executed,
                    iterations,
                })
            }
            Err(e) => {
                self.record_failure(text, &e);
                Err(e)
            }
        }
    }

    /// Confirm or cancel every outstanding pending action.
    ///
    /// Confirmed actions run directly against the router, bypassing the
    /// loop. Either way a summary message is appended, and it also lists the
    /// calls from the same batch that ran before the loop stopped.
    pub async fn resolve_pending(&mut self, confirm: bool) -> Result<Resolution, AgentError> {
        if self.pending.is_empty() {
            return Err(AgentError::InvalidState {
                reason: "no pending actions to resolve".into(),
            });
        }
        let actions = std::mem::take(&mut self.pending);
        let executed = std::mem::take(&mut self.executed);
        let resolution = self
            .orchestrator
            .gate()
            .resolve(&actions, confirm, self.orchestrator.router())
            .await
            .with_executed(&executed);
        self.messages
            .push(ConversationMessage::assistant(resolution.message()));
        match &resolution {
            Resolution::Executed { .. } => self.tracker.set_completed(),
            Resolution::Cancelled { .. } => self.tracker.reset(),
        }
        Ok(resolution)
    }

    /// Re-send the prompt of the last failed send.
    pub async fn retry_last(&mut self) -> Result<RunOutcome, AgentError> {
        let prompt = self.retry_prompt.take().ok_or(AgentError::InvalidState {
            reason: "nothing to retry".into(),
        })?;

        // Drop the failure placeholder and the prompt it answered.
        if self.messages.last().is_some_and(|m| m.is_error) {
            self.messages.pop();
            if self.messages.last().is_some_and(|m| m.content == prompt) {
                self.messages.pop();
            }
        }
        tracing::info!("retrying last failed send");
        self.send(&prompt).await
    }

    /// Plain streamed reply without tools.
    pub async fn stream_reply<F>(&mut self, text: &str, on_chunk: F) -> Result<String, AgentError>
    where
        F: FnMut(&str),
    {
        self.ensure_no_pending()?;
        self.messages.push(ConversationMessage::user(text));
        self.retry_prompt = None;

        let mut outcome = None;
        self.responder
            .stream(&self.messages, &self.config, on_chunk, |result| {
                outcome = Some(result)
            })
            .await;
        let result = outcome.unwrap_or_else(|| {
            Err(AgentError::InvalidState {
                reason: "stream ended without completion".into(),
            })
        });

        match result {
            Ok(reply) => {
                self.messages.push(ConversationMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.record_failure(text, &e);
                Err(e)
            }
        }
    }

    fn ensure_no_pending(&self) -> Result<(), AgentError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(AgentError::PendingActionsUnresolved {
                count: self.pending.len(),
            })
        }
    }

    fn record_failure(&mut self, prompt: &str, error: &AgentError) {
        let retry = error.is_retryable().then(|| prompt.to_string());
        tracing::warn!(
            error = %error,
            category = ?error.category(),
            retryable = retry.is_some(),
            "send failed"
        );
        self.tracker.set_error(&error.user_message());
        self.messages
            .push(ConversationMessage::failure(error.user_message(), retry.clone()));
        self.retry_prompt = retry;
    }
}
