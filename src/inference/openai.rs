//! OpenAI Chat Completions wire format.
//!
//! Tools serialize as `{type: "function", function: {name, description,
//! parameters}}`. Tool calls come back with JSON-string arguments and results
//! are sent as `tool` role messages keyed by `tool_call_id`.

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;
use super::tool_call_parser::parse_json_string_arguments;
use super::types::{
    arguments_to_json, ChatMessage, ChatRequest, ProviderReply, Role, StreamEvent,
};
use crate::capabilities::types::Tool;

// ─── Request Types ───────────────────────────────────────────────────────────

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A single message on the wire.
///
/// `content` is emitted as `""` rather than `null` for assistant turns that
/// only carry tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Tool call as carried in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

// ─── Serialization ───────────────────────────────────────────────────────────

/// Convert a tool to its OpenAI function definition.
pub fn tool_definition(tool: &Tool) -> ToolDefinition {
    ToolDefinition {
        r#type: "function".to_string(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters_schema(),
        },
    }
}

fn wire_message(msg: &ChatMessage) -> WireMessage {
    match msg.role {
        Role::Assistant if !msg.tool_calls.is_empty() => WireMessage {
            role: Role::Assistant,
            content: Some(msg.content.clone()).filter(|c| !c.is_empty()),
            tool_call_id: None,
            tool_calls: Some(
                msg.tool_calls
                    .iter()
                    .map(|call| ToolCallResponse {
                        id: call.id.clone(),
                        r#type: "function".to_string(),
                        function: FunctionCallResponse {
                            name: call.name.clone(),
                            arguments: arguments_to_json(&call.arguments).to_string(),
                        },
                    })
                    .collect(),
            ),
        },
        // OpenAI has no error flag on tool messages; mark failures in the text.
        Role::Tool => WireMessage {
            role: Role::Tool,
            content: Some(if msg.is_error {
                format!("Error: {}", msg.content)
            } else {
                msg.content.clone()
            }),
            tool_call_id: msg.tool_call_id.clone(),
            tool_calls: None,
        },
        role => WireMessage {
            role,
            content: Some(msg.content.clone()),
            tool_call_id: None,
            tool_calls: None,
        },
    }
}

/// Build the request body. The system prompt becomes the first message.
pub fn build_request(request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(ref system) = request.system_prompt {
        messages.push(wire_message(&ChatMessage::system(system.clone())));
    }
    messages.extend(request.messages.iter().map(wire_message));

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(request.tools.iter().map(tool_definition).collect())
    };

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        tools,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream,
    }
}

// ─── Response Parsing ────────────────────────────────────────────────────────

/// Parse a non-streaming chat completion body.
pub fn parse_response(body: &str) -> Result<ProviderReply, InferenceError> {
    #[derive(Deserialize)]
    struct CompletionResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ResponseMessage,
        finish_reason: Option<String>,
    }

    #[derive(Deserialize)]
    struct ResponseMessage {
        content: Option<String>,
        tool_calls: Option<Vec<ResponseToolCall>>,
    }

    #[derive(Deserialize)]
    struct ResponseToolCall {
        id: Option<String>,
        function: FunctionCallResponse,
    }

    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse chat completion: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::MalformedResponse {
            reason: "empty choices array".into(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .iter()
        .map(|tc| {
            parse_json_string_arguments(
                tc.id.as_deref(),
                &tc.function.name,
                &tc.function.arguments,
            )
        })
        .collect();

    Ok(ProviderReply {
        text: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls,
        stop_reason: choice.finish_reason,
    })
}

/// Decode one SSE `data:` payload from a streaming completion.
pub fn decode_stream_data(data: &str) -> Result<StreamEvent, InferenceError> {
    #[derive(Deserialize)]
    struct Chunk {
        #[serde(default)]
        choices: Vec<ChunkChoice>,
        error: Option<ChunkError>,
    }

    #[derive(Deserialize)]
    struct ChunkChoice {
        #[serde(default)]
        delta: ChunkDelta,
        finish_reason: Option<String>,
    }

    #[derive(Deserialize, Default)]
    struct ChunkDelta {
        content: Option<String>,
    }

    #[derive(Deserialize)]
    struct ChunkError {
        message: String,
    }

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    if data.is_empty() {
        return Ok(StreamEvent::Skip);
    }

    let chunk: Chunk = serde_json::from_str(data).map_err(|e| InferenceError::StreamError {
        reason: format!("invalid chunk JSON: {e}"),
    })?;

    if let Some(err) = chunk.error {
        return Err(InferenceError::StreamError {
            reason: err.message,
        });
    }

    match chunk.choices.into_iter().next() {
        Some(ChunkChoice {
            delta: ChunkDelta {
                content: Some(text),
            },
            ..
        }) if !text.is_empty() => Ok(StreamEvent::Text(text)),
        // finish_reason arrives one frame before [DONE]; keep reading until the marker.
        Some(ChunkChoice { finish_reason, .. }) => {
            if let Some(reason) = finish_reason {
                tracing::debug!(finish_reason = %reason, "openai stream finished");
            }
            Ok(StreamEvent::Skip)
        }
        None => Ok(StreamEvent::Skip),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
