//! Shared types for the agent core.
//!
//! Conversation messages, pending actions, and the event stream the
//! orchestrator emits while a send is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capabilities::types::CapabilityDomain;
use crate::inference::types::{ChatMessage, Role, ToolCall};

// ─── Conversation Messages ──────────────────────────────────────────────────

/// A single message in the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// `User` or `Assistant`. Tool traffic never appears here.
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set on the assistant message that replaces a failed send.
    #[serde(default)]
    pub is_error: bool,
    /// The prompt to re-send when the user taps retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            is_error: false,
            retry_prompt: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(content)
        }
    }

    /// Assistant message standing in for a failed send.
    pub fn failure(content: impl Into<String>, retry_prompt: Option<String>) -> Self {
        Self {
            is_error: true,
            retry_prompt,
            ..Self::assistant(content)
        }
    }

    /// Provider-facing form. Error placeholders are not part of the context.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        if self.is_error {
            return None;
        }
        match self.role {
            Role::User => Some(ChatMessage::user(self.content.clone())),
            Role::Assistant => Some(ChatMessage::assistant(self.content.clone())),
            Role::System | Role::Tool => None,
        }
    }
}

// ─── Pending Actions ────────────────────────────────────────────────────────

/// Why a tool call needs confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Delete,
    Update,
    Complete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Delete => "delete",
            ActionKind::Update => "update",
            ActionKind::Complete => "complete",
        }
    }
}

/// A destructive tool call held back until the user decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Equals the underlying call id.
    pub id: String,
    pub call: ToolCall,
    pub title: String,
    pub details: String,
    pub domain: Option<CapabilityDomain>,
    pub kind: ActionKind,
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// Structured progress of one run, consumed by `ProgressTracker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    ToolsLoaded {
        tool_names: Vec<String>,
    },
    IterationStarted {
        iteration: usize,
    },
    ToolCallStarted {
        call_id: String,
        tool_name: String,
        domain: Option<CapabilityDomain>,
    },
    ToolCallCompleted {
        call_id: String,
        tool_name: String,
        success: bool,
        message: String,
    },
    IterationCompleted {
        iteration: usize,
    },
    /// The run stopped with `count` actions held for the user.
    AwaitingConfirmation {
        count: usize,
    },
    Completed,
    Failed {
        message: String,
    },
}

/// Everything the orchestrator reports while a send is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Short human-readable status line.
    Status { text: String },
    Progress(ProgressEvent),
    PendingAction(PendingAction),
}
