//! Shared, provider-agnostic types for the inference layer.
//!
//! Wire shapes live in `openai` and `claude`. Everything above that boundary
//! (the orchestrator, the router, the gate) only sees the types in this file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capabilities::types::Tool;

// ─── Messages ────────────────────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the working context sent to a provider.
///
/// Assistant entries may carry the tool calls the model requested; tool
/// entries carry the result for exactly one call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls (text may be empty).
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Tool-response entry acknowledging one call.
    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            tool_call_id: Some(result.call_id.clone()),
            is_error: result.is_error,
            ..Self::plain(Role::Tool, result.content.clone())
        }
    }
}

// ─── Tool Arguments ──────────────────────────────────────────────────────────

/// A loosely-typed scalar argument value sent by the model.
///
/// Providers send JSON; only scalars survive the boundary. Nested arrays and
/// objects are rejected during parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

/// Argument name → value.
pub type ToolArguments = BTreeMap<String, ArgValue>;

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(i) => Some(*i),
            // Out-of-range floats would saturate under `as`.
            ArgValue::Number(n)
                if n.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(n) =>
            {
                Some(*n as i64)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Integer(i) => Some(*i as f64),
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// JSON-schema style name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Boolean(_) => "boolean",
            ArgValue::Integer(_) => "integer",
            ArgValue::Number(_) => "number",
            ArgValue::String(_) => "string",
        }
    }

    /// Convert one JSON value, rejecting nested structures.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Null => Ok(ArgValue::Null),
            serde_json::Value::Bool(b) => Ok(ArgValue::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ArgValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ArgValue::Number(f))
                } else {
                    Err(format!("number {n} is out of range"))
                }
            }
            serde_json::Value::String(s) => Ok(ArgValue::String(s.clone())),
            serde_json::Value::Array(_) => Err("arrays are not supported".into()),
            serde_json::Value::Object(_) => Err("nested objects are not supported".into()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Null => serde_json::Value::Null,
            ArgValue::Boolean(b) => serde_json::Value::Bool(*b),
            ArgValue::Integer(i) => serde_json::Value::from(*i),
            ArgValue::Number(n) => serde_json::Value::from(*n),
            ArgValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Convert a JSON object into typed arguments.
pub fn arguments_from_json(value: &serde_json::Value) -> Result<ToolArguments, String> {
    let object = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(ToolArguments::new()),
        other => return Err(format!("arguments must be a JSON object, got {other}")),
    };
    object
        .iter()
        .map(|(key, v)| {
            ArgValue::from_json(v)
                .map(|arg| (key.clone(), arg))
                .map_err(|reason| format!("argument '{key}': {reason}"))
        })
        .collect()
}

/// Convert typed arguments back into a JSON object.
pub fn arguments_to_json(args: &ToolArguments) -> serde_json::Value {
    serde_json::Value::Object(
        args.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

// ─── Tool Calls & Results ────────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned correlation id (generated if the provider omits it).
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// String argument lookup, used when building previews.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// A tool call as parsed from a provider response.
///
/// Malformed calls still carry their id so the loop can acknowledge them
/// with an error result.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedToolCall {
    Valid(ToolCall),
    Malformed {
        id: String,
        name: String,
        reason: String,
    },
}

impl ParsedToolCall {
    pub fn id(&self) -> &str {
        match self {
            ParsedToolCall::Valid(call) => &call.id,
            ParsedToolCall::Malformed { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ParsedToolCall::Valid(call) => &call.name,
            ParsedToolCall::Malformed { name, .. } => name,
        }
    }

    /// The call as echoed back in the assistant history entry. Malformed
    /// calls are echoed with empty arguments.
    pub fn to_history_call(&self) -> ToolCall {
        match self {
            ParsedToolCall::Valid(call) => call.clone(),
            ParsedToolCall::Malformed { id, name, .. } => {
                ToolCall::new(id.clone(), name.clone(), ToolArguments::new())
            }
        }
    }
}

/// Outcome of executing one tool call. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

// ─── Provider Request / Reply ────────────────────────────────────────────────

/// Everything a provider needs for one round trip.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A parsed, non-streaming provider reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderReply {
    /// Assistant text, if any. May accompany tool calls.
    pub text: Option<String>,
    pub tool_calls: Vec<ParsedToolCall>,
    /// Provider stop/finish reason, for logging.
    pub stop_reason: Option<String>,
}

impl ProviderReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls.into_iter().map(ParsedToolCall::Valid).collect(),
            ..Self::default()
        }
    }

    /// A reply with no tool calls ends the loop.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// One decoded server-sent event from a streaming reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment to hand to the caller.
    Text(String),
    /// The provider's completion marker.
    Done,
    /// Bookkeeping frames (pings, role headers, usage) with no text.
    Skip,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
