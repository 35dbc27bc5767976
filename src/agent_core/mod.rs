//! Agent Core: tool-calling orchestration for ChatPilot.
//!
//! Submodules:
//! - `orchestrator`: Bounded ReAct loop between the provider and the router
//! - `pending_actions`: Confirmation gate for delete/update/complete calls
//! - `progress`: Append-only progress record for the UI
//! - `responder`: Streaming plain-chat replies
//! - `session`: The active conversation and its pending actions
//! - `types`: Conversation messages, pending actions, events
//! - `errors`: Agent-level error types

pub mod errors;
pub mod orchestrator;
pub mod pending_actions;
pub mod progress;
pub mod responder;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use errors::AgentError;
pub use orchestrator::{Orchestrator, RunOutcome, MAX_ITERATIONS};
pub use pending_actions::{ActionDescription, PendingActionGate, Resolution};
pub use progress::{ProcessIteration, ProcessPhase, ProgressTracker, ToolCallRecord, ToolCallStatus};
pub use responder::StreamingResponder;
pub use session::ChatSession;
pub use types::{ActionKind, AgentEvent, ConversationMessage, PendingAction, ProgressEvent};
