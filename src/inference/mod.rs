//! Inference: everything between the orchestrator and an LLM provider.
//!
//! This module handles all communication with the provider endpoint:
//! - Provider-agnostic request/reply types and tool-call arguments
//! - OpenAI Chat Completions and Anthropic Messages wire formats
//! - Native tool-call parsing for both formats
//! - SSE stream parsing for plain-text streaming replies
//! - Failure classification for user messaging
//! - Chat configuration loading from `config/chat.yaml`
//!
//! The orchestrator only sees `ChatProvider`, so switching providers is a
//! config change, not a code change.

pub mod claude;
pub mod client;
pub mod config;
pub mod error_classifier;
pub mod errors;
pub mod mock;
pub mod openai;
pub mod streaming;
pub mod tool_call_parser;
pub mod types;

// Re-exports for convenience
pub use client::{ChatProvider, HttpChatProvider, TextStream};
pub use config::{ChatConfig, ProviderKind};
pub use error_classifier::{classify, ErrorCategory, RawError, TransportCode};
pub use errors::InferenceError;
pub use mock::{ScriptedError, ScriptedProvider};
pub use types::{
    ArgValue, ChatMessage, ChatRequest, ParsedToolCall, ProviderReply, Role, ToolArguments,
    ToolCall, ToolResult,
};
