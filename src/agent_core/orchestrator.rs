//! Orchestration loop: the bounded ReAct cycle between the provider and the
//! capability router.
//!
//! One `run` per user send:
//! 1. **Load tools** from the router (skipped when tool use is disabled)
//! 2. **Think** by sending the working context and tool list to the provider
//! 3. **Act** on the requested calls. Destructive calls are held as pending
//!    actions, everything else is dispatched concurrently and the results
//!    are folded back in call order
//!
//! The run ends on a plain-text answer, on pending actions, on a provider
//! failure, or after `MAX_ITERATIONS` rounds.

use std::sync::Arc;

use chrono::Local;
use futures::future::join_all;
use tokio::sync::mpsc::UnboundedSender;

use crate::capabilities::registry::CapabilityRouter;
use crate::capabilities::types::Tool;
use crate::inference::client::ChatProvider;
use crate::inference::config::ChatConfig;
use crate::inference::types::{ChatMessage, ChatRequest, ParsedToolCall, ToolCall, ToolResult};

use super::errors::{AgentError, COULD_NOT_COMPLETE_MESSAGE};
use super::pending_actions::PendingActionGate;
use super::progress::truncate_utf8;
use super::types::{AgentEvent, ConversationMessage, PendingAction, ProgressEvent};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Hard upper bound on provider round trips per send.
pub const MAX_ITERATIONS: usize = 5;

/// Maximum bytes of a single tool result folded into the working context.
pub const MAX_TOOL_RESULT_CHARS: usize = 6_000;

const SYSTEM_PROMPT_INTRO: &str = "\
You are a helpful personal assistant inside a chat app.";

const TOOL_GUIDANCE: &str = "\
You can read and change the user's calendar and reminders with the provided tools. \
Call list tools first when you need an event or reminder id. \
Deleting, updating or completing an item asks the user for confirmation automatically, \
so request it directly instead of asking the user yourself. \
When a tool returns an error, explain it briefly or try a different approach.";

// ─── Types ──────────────────────────────────────────────────────────────────

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The provider produced a plain-text answer.
    Answer { text: String, iterations: usize },
    /// Destructive calls are waiting for the user. No final answer yet.
    AwaitingConfirmation {
        pending: Vec<PendingAction>,
        /// Results of the non-destructive calls from the same batch.
        executed: Vec<ToolResult>,
        iterations: usize,
    },
}

/// Drives the loop for one conversation. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    router: Arc<CapabilityRouter>,
    gate: PendingActionGate,
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

impl Orchestrator {
    pub fn new(provider: Arc<dyn ChatProvider>, router: Arc<CapabilityRouter>) -> Self {
        Self {
            provider,
            router,
            gate: PendingActionGate::new(),
        }
    }

    pub fn router(&self) -> &Arc<CapabilityRouter> {
        &self.router
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    pub fn gate(&self) -> &PendingActionGate {
        &self.gate
    }

    /// Run the loop for one user message.
    ///
    /// `history` is a read-only snapshot of the visible conversation, not
    /// including `user_message`. Events are best-effort: a dropped receiver
    /// does not affect the run.
    pub async fn run(
        &self,
        user_message: &str,
        history: &[ConversationMessage],
        config: &ChatConfig,
        events: &UnboundedSender<AgentEvent>,
    ) -> Result<RunOutcome, AgentError> {
        let emit = |event: AgentEvent| {
            let _ = events.send(event);
        };
        let progress = |event: ProgressEvent| emit(AgentEvent::Progress(event));

        // ── 1. Tools ────────────────────────────────────────────────────
        emit(AgentEvent::Status {
            text: "Loading tools...".into(),
        });
        let tools: Vec<Tool> = if config.tool_use_enabled {
            match self.router.all_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    let err = AgentError::from(e);
                    tracing::error!(error = %err, "tool listing rejected");
                    progress(ProgressEvent::Failed {
                        message: err.user_message(),
                    });
                    return Err(err);
                }
            }
        } else {
            Vec::new()
        };
        tracing::info!(
            providers = self.router.provider_count(),
            tool_count = tools.len(),
            tool_use_enabled = config.tool_use_enabled,
            "tools loaded"
        );
        progress(ProgressEvent::ToolsLoaded {
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        let hinted = self.router.hinted_domains(user_message);
        tracing::debug!(hinted_domains = ?hinted, "capability hints");

        let system_prompt = build_system_prompt(config, !tools.is_empty());
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .filter_map(ConversationMessage::to_chat_message)
            .collect();
        messages.push(ChatMessage::user(user_message));

        // ── 2. Loop ─────────────────────────────────────────────────────
        for iteration in 1..=MAX_ITERATIONS {
            tracing::info!(
                iteration,
                max_iterations = MAX_ITERATIONS,
                message_count = messages.len(),
                tool_count = tools.len(),
                "=== ORCHESTRATION ITERATION START ==="
            );
            progress(ProgressEvent::IterationStarted { iteration });
            emit(AgentEvent::Status {
                text: "Thinking...".into(),
            });

            let request = ChatRequest {
                model: config.effective_model().to_string(),
                system_prompt: Some(system_prompt.clone()),
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            };

            let reply = match self.provider.complete(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    let err = AgentError::from(e);
                    tracing::warn!(iteration, error = %err, "provider request failed, aborting run");
                    progress(ProgressEvent::Failed {
                        message: err.user_message(),
                    });
                    return Err(err);
                }
            };

            tracing::info!(
                iteration,
                text_len = reply.text.as_deref().map_or(0, str::len),
                tool_calls_count = reply.tool_calls.len(),
                tool_names = ?reply.tool_calls.iter().map(ParsedToolCall::name).collect::<Vec<_>>(),
                stop_reason = ?reply.stop_reason,
                "=== MODEL RESPONSE ==="
            );

            if reply.is_final() {
                let text = reply.text.unwrap_or_default();
                progress(ProgressEvent::IterationCompleted { iteration });
                progress(ProgressEvent::Completed);
                tracing::info!(iteration, answer_len = text.len(), "orchestration finished with answer");
                return Ok(RunOutcome::Answer {
                    text,
                    iterations: iteration,
                });
            }

            messages.push(ChatMessage::assistant_tool_calls(
                reply.text.clone().unwrap_or_default(),
                reply.tool_calls.iter().map(ParsedToolCall::to_history_call).collect(),
            ));

            // ── 3. Act ──────────────────────────────────────────────────
            let (results, pending) = self.act(&reply.tool_calls, events).await;
            progress(ProgressEvent::IterationCompleted { iteration });

            if !pending.is_empty() {
                tracing::info!(
                    iteration,
                    pending = pending.len(),
                    executed = results.len(),
                    "stopping for user confirmation"
                );
                progress(ProgressEvent::AwaitingConfirmation {
                    count: pending.len(),
                });
                emit(AgentEvent::Status {
                    text: format!("Waiting for confirmation of {} action(s)", pending.len()),
                });
                return Ok(RunOutcome::AwaitingConfirmation {
                    pending,
                    executed: results,
                    iterations: iteration,
                });
            }

            debug_assert_eq!(results.len(), reply.tool_calls.len());
            for (parsed, result) in reply.tool_calls.iter().zip(&results) {
                let folded = ToolResult {
                    content: truncate_tool_result(&result.content, parsed.name()),
                    ..result.clone()
                };
                messages.push(ChatMessage::tool_result(&folded));
            }
        }

        tracing::warn!(
            max_iterations = MAX_ITERATIONS,
            "max iterations reached without a final answer"
        );
        progress(ProgressEvent::Failed {
            message: COULD_NOT_COMPLETE_MESSAGE.to_string(),
        });
        Err(AgentError::MaxIterationsExceeded {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Handle one batch of calls.
    ///
    /// Returns the results of every call that was not held back, in call
    /// order, plus the pending actions raised by the batch.
    async fn act(
        &self,
        calls: &[ParsedToolCall],
        events: &UnboundedSender<AgentEvent>,
    ) -> (Vec<ToolResult>, Vec<PendingAction>) {
        let emit = |event: AgentEvent| {
            let _ = events.send(event);
        };

        let mut pending = Vec::new();
        // A call paired with a result was rejected up front and is not dispatched.
        let mut runnable: Vec<(&ParsedToolCall, Option<ToolResult>)> = Vec::with_capacity(calls.len());
        for parsed in calls {
            let ParsedToolCall::Valid(call) = parsed else {
                runnable.push((parsed, None));
                continue;
            };
            let Some(action) = self.gate.pending(call, self.router.domain_for(&call.name)) else {
                runnable.push((parsed, None));
                continue;
            };
            // Never ask the user to confirm a call that cannot run.
            if let Err(e) = self.router.validate_tool_call(call) {
                let err = AgentError::from(e);
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %err,
                    "destructive call rejected before confirmation"
                );
                runnable.push((parsed, Some(ToolResult::failure(&call.id, err.to_string()))));
                continue;
            }
            emit(AgentEvent::PendingAction(action.clone()));
            pending.push(action);
        }

        for (parsed, _) in &runnable {
            emit(AgentEvent::Progress(ProgressEvent::ToolCallStarted {
                call_id: parsed.id().to_string(),
                tool_name: parsed.name().to_string(),
                domain: self.router.domain_for(parsed.name()),
            }));
        }
        if let Some((first, _)) = runnable.first() {
            emit(AgentEvent::Status {
                text: format!("Calling {}...", first.name()),
            });
        }

        let results = join_all(runnable.iter().map(|(parsed, rejected)| async move {
            match rejected {
                Some(result) => result.clone(),
                None => self.execute_one(parsed).await,
            }
        }))
        .await;

        for ((parsed, _), result) in runnable.iter().zip(&results) {
            emit(AgentEvent::Progress(ProgressEvent::ToolCallCompleted {
                call_id: result.call_id.clone(),
                tool_name: parsed.name().to_string(),
                success: !result.is_error,
                message: result.content.clone(),
            }));
        }

        (results, pending)
    }

    async fn execute_one(&self, parsed: &ParsedToolCall) -> ToolResult {
        match parsed {
            ParsedToolCall::Valid(call) => self.dispatch(call).await,
            ParsedToolCall::Malformed { id, name, reason } => {
                tracing::warn!(tool = %name, call_id = %id, reason = %reason, "malformed tool call");
                ToolResult::failure(id.clone(), format!("invalid arguments for '{name}': {reason}"))
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        tracing::info!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        self.router.dispatch(call).await
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// System prompt with the current local time and any user instructions.
pub fn build_system_prompt(config: &ChatConfig, tools_available: bool) -> String {
    let now = Local::now();
    let mut prompt = format!(
        "{SYSTEM_PROMPT_INTRO}\nThe current date and time is {}.",
        now.format("%A, %B %-d, %Y %H:%M")
    );
    if tools_available {
        prompt.push_str("\n\n");
        prompt.push_str(TOOL_GUIDANCE);
    }
    if let Some(custom) = config.system_prompt.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(custom);
    }
    prompt
}

/// Cap a tool result at `MAX_TOOL_RESULT_CHARS`, keeping the beginning.
fn truncate_tool_result(result: &str, tool_name: &str) -> String {
    if result.len() <= MAX_TOOL_RESULT_CHARS {
        return result.to_string();
    }
    let truncated = truncate_utf8(result, MAX_TOOL_RESULT_CHARS);
    tracing::warn!(
        tool = %tool_name,
        original_len = result.len(),
        truncated_to = truncated.len(),
        "tool result truncated"
    );
    format!(
        "{truncated}\n\n[... truncated: showing first {} of {} chars]",
        truncated.len(),
        result.len()
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────
