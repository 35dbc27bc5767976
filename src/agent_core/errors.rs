//! Agent Core error types.

use thiserror::Error;

use crate::capabilities::errors::CapabilityError;
use crate::inference::error_classifier::{classify_inference_error, ErrorCategory};
use crate::inference::errors::InferenceError;

/// User-facing text for a run that hit the iteration limit.
pub const COULD_NOT_COMPLETE_MESSAGE: &str =
    "I couldn't complete that request. Please try rephrasing it or breaking it into smaller steps.";

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Provider round trip failed. Aborts the current send.
    #[error("provider request failed ({category}): {source}")]
    Provider {
        category: ErrorCategory,
        #[source]
        source: InferenceError,
    },

    // The three tool-level variants never abort a send. The loop turns them
    // into error results for the model; API consumers calling providers
    // directly get them through `From<CapabilityError>`.

    /// Tool arguments were missing, null or of the wrong type.
    #[error("{reason}")]
    ToolArgument { reason: String },

    /// A capability provider reported a failure.
    #[error("{reason}")]
    ToolExecution { reason: String },

    /// Tool name not owned by any registered provider.
    #[error("no capability provider owns tool '{tool_name}'")]
    Routing { tool_name: String },

    /// Invalid chat config or inconsistent provider registration
    /// (e.g. duplicate tool names).
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The loop ran out of iterations without a plain-text answer.
    #[error("no final answer after {iterations} iterations")]
    MaxIterationsExceeded { iterations: usize },

    /// The user declined the pending actions. A normal terminal outcome.
    #[error("{count} pending action(s) cancelled by user")]
    ActionCancelled { count: usize },

    /// A send was attempted while confirmations are outstanding.
    #[error("{count} pending action(s) must be confirmed or cancelled first")]
    PendingActionsUnresolved { count: usize },

    /// Nothing to act on (e.g. retry without a failed send).
    #[error("invalid session state: {reason}")]
    InvalidState { reason: String },
}

impl From<InferenceError> for AgentError {
    fn from(source: InferenceError) -> Self {
        if let InferenceError::ConfigError { reason } = source {
            return AgentError::Configuration { reason };
        }
        AgentError::Provider {
            category: classify_inference_error(&source),
            source,
        }
    }
}

impl From<CapabilityError> for AgentError {
    fn from(e: CapabilityError) -> Self {
        match e {
            CapabilityError::UnknownTool { name } => AgentError::Routing { tool_name: name },
            CapabilityError::DuplicateTool { .. } => AgentError::Configuration {
                reason: e.to_string(),
            },
            CapabilityError::MissingArgument { .. } | CapabilityError::InvalidArgument { .. } => {
                AgentError::ToolArgument {
                    reason: e.to_string(),
                }
            }
            CapabilityError::PermissionDenied { .. }
            | CapabilityError::NotFound { .. }
            | CapabilityError::Platform { .. } => AgentError::ToolExecution {
                reason: e.to_string(),
            },
        }
    }
}

impl AgentError {
    /// Classified category, for provider failures only.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            AgentError::Provider { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Whether the UI should offer to re-send the original prompt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Provider { category, .. } => category.is_retryable(),
            AgentError::MaxIterationsExceeded { .. } => true,
            _ => false,
        }
    }

    /// Text shown in the assistant message that replaces a failed answer.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider { category, .. } => category.guidance().to_string(),
            AgentError::MaxIterationsExceeded { .. } => COULD_NOT_COMPLETE_MESSAGE.to_string(),
            AgentError::ActionCancelled { .. } => "Okay, I didn't make any changes.".to_string(),
            AgentError::PendingActionsUnresolved { .. } => {
                "Please confirm or cancel the pending changes first.".to_string()
            }
            AgentError::Configuration { reason } => {
                format!("The assistant is misconfigured: {reason}. Check Settings and try again.")
            }
            other => format!("Something went wrong: {other}"),
        }
    }
}
