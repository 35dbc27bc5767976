//! Anthropic Messages API wire format.
//!
//! Tools serialize as `{name, description, input_schema}`. The system prompt
//! is a top-level field, tool calls come back as `tool_use` content blocks
//! with an object `input`, and results go back as `tool_result` blocks inside
//! a user message.

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;
use super::tool_call_parser::parse_object_arguments;
use super::types::{arguments_to_json, ChatMessage, ChatRequest, ProviderReply, Role, StreamEvent};
use crate::capabilities::types::Tool;

/// Value of the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

// ─── Request Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One content block of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this client does not interpret (thinking, images, ...).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ClaudeTool>>,
    pub temperature: f32,
    pub stream: bool,
}

// ─── Serialization ───────────────────────────────────────────────────────────

/// Convert a tool to its Claude definition.
pub fn tool_definition(tool: &Tool) -> ClaudeTool {
    ClaudeTool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.parameters_schema(),
    }
}

fn content_blocks(msg: &ChatMessage) -> (&'static str, Vec<ContentBlock>) {
    match msg.role {
        Role::Tool => (
            "user",
            vec![ContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: msg.content.clone(),
                is_error: msg.is_error,
            }],
        ),
        Role::Assistant => {
            let mut blocks = Vec::new();
            if !msg.content.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: msg.content.clone(),
                });
            }
            blocks.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: arguments_to_json(&call.arguments),
            }));
            ("assistant", blocks)
        }
        Role::User | Role::System => (
            "user",
            vec![ContentBlock::Text {
                text: msg.content.clone(),
            }],
        ),
    }
}

/// Build the request body.
///
/// System-role history entries are folded into the top-level `system` field.
/// Consecutive entries that map to the same wire role are merged, so all tool
/// results of one turn travel in a single user message.
pub fn build_request(request: &ChatRequest, stream: bool) -> MessagesRequest {
    let mut system_parts: Vec<String> = request.system_prompt.iter().cloned().collect();
    let mut messages: Vec<WireMessage> = Vec::new();

    for msg in &request.messages {
        if msg.role == Role::System {
            system_parts.push(msg.content.clone());
            continue;
        }
        let (role, blocks) = content_blocks(msg);
        if blocks.is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(WireMessage {
                role,
                content: blocks,
            }),
        }
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(request.tools.iter().map(tool_definition).collect())
    };

    MessagesRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        messages,
        tools,
        temperature: request.temperature,
        stream,
    }
}

// ─── Response Parsing ────────────────────────────────────────────────────────

/// Parse a non-streaming Messages API body.
pub fn parse_response(body: &str) -> Result<ProviderReply, InferenceError> {
    #[derive(Deserialize)]
    struct MessagesResponse {
        content: Vec<ContentBlock>,
        stop_reason: Option<String>,
    }

    let resp: MessagesResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse messages response: {e}"),
        })?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &resp.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(parse_object_arguments(Some(id), name, input));
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unsupported => {}
        }
    }

    Ok(ProviderReply {
        text: Some(text).filter(|t| !t.is_empty()),
        tool_calls,
        stop_reason: resp.stop_reason,
    })
}

/// Decode one SSE frame from a streaming Messages response.
///
/// The payload's own `type` field is authoritative; the `event:` line is
/// only used when the payload omits it.
pub fn decode_stream_event(event: Option<&str>, data: &str) -> Result<StreamEvent, InferenceError> {
    #[derive(Deserialize)]
    struct Frame {
        r#type: Option<String>,
        delta: Option<Delta>,
        error: Option<FrameError>,
    }

    #[derive(Deserialize)]
    struct Delta {
        r#type: Option<String>,
        text: Option<String>,
    }

    #[derive(Deserialize)]
    struct FrameError {
        message: String,
    }

    if data.trim().is_empty() {
        return Ok(StreamEvent::Skip);
    }

    let frame: Frame = serde_json::from_str(data).map_err(|e| InferenceError::StreamError {
        reason: format!("invalid event JSON: {e}"),
    })?;

    let kind = frame.r#type.as_deref().or(event).unwrap_or_default();
    match kind {
        "content_block_delta" => match frame.delta {
            Some(Delta {
                text: Some(text),
                r#type,
            }) if r#type.as_deref().map_or(true, |t| t == "text_delta") && !text.is_empty() => {
                Ok(StreamEvent::Text(text))
            }
            _ => Ok(StreamEvent::Skip),
        },
        "message_stop" => Ok(StreamEvent::Done),
        "error" => Err(InferenceError::StreamError {
            reason: frame
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "provider reported a stream error".into()),
        }),
        _ => Ok(StreamEvent::Skip),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::types::ParameterType;
    use crate::inference::types::{ArgValue, ParsedToolCall, ToolArguments, ToolCall, ToolResult};

    fn delete_event_tool() -> Tool {
        Tool::new("delete_event", "Delete a calendar event")
            .param("event_id", ParameterType::String, "Event identifier")
            .optional_param("notify", ParameterType::Boolean, "Notify attendees")
    }

    #[test]
    fn test_tool_definition_shape() {
        let value = serde_json::to_value(tool_definition(&delete_event_tool())).unwrap();
        assert_eq!(value["name"], "delete_event");
        assert_eq!(value["input_schema"]["type"], "object");
        assert_eq!(value["input_schema"]["properties"]["notify"]["type"], "boolean");
        assert_eq!(value["input_schema"]["required"], serde_json::json!(["event_id"]));
        assert!(value.get("function").is_none());
    }

    #[test]
    fn test_build_request_groups_tool_results() {
        let a = ToolCall::new("toolu_1", "list_events", ToolArguments::new());
        let b = ToolCall::new("toolu_2", "list_reminders", ToolArguments::new());
        let request = ChatRequest {
            model: "claude-3-5-haiku-latest".into(),
            system_prompt: Some("be brief".into()),
            messages: vec![
                ChatMessage::user("What's on today?"),
                ChatMessage::assistant_tool_calls("Checking.", vec![a, b]),
                ChatMessage::tool_result(&ToolResult::success("toolu_1", "2 events")),
                ChatMessage::tool_result(&ToolResult::failure("toolu_2", "permission denied")),
            ],
            tools: vec![delete_event_tool()],
            max_tokens: 512,
            temperature: 0.5,
        };
        let body = serde_json::to_value(build_request(&request, false)).unwrap();

        assert_eq!(body["system"], "be brief");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "text");
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[1]["content"][2]["id"], "toolu_2");
        assert_eq!(messages[2]["role"], "user");
        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "toolu_1");
        assert!(results[0].get("is_error").is_none());
        assert_eq!(results[1]["is_error"], true);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_round_trip_tool_use() {
        let tool = delete_event_tool();
        let definition = tool_definition(&tool);
        let body = serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "I'll delete that."},
                {"type": "tool_use", "id": "toolu_9", "name": definition.name,
                 "input": {"event_id": "evt-3", "notify": true}}
            ],
            "stop_reason": "tool_use"
        })
        .to_string();

        let reply = parse_response(&body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("I'll delete that."));
        let ParsedToolCall::Valid(call) = &reply.tool_calls[0] else {
            panic!("expected a valid call");
        };
        assert_eq!(call.id, "toolu_9");
        assert_eq!(call.name, tool.name);
        assert_eq!(call.arguments["event_id"], ArgValue::String("evt-3".into()));
        assert_eq!(call.arguments["notify"], ArgValue::Boolean(true));
    }

    #[test]
    fn test_parse_ignores_unknown_blocks() {
        let body = r#"{"content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"4"}],"stop_reason":"end_turn"}"#;
        let reply = parse_response(body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("4"));
        assert!(reply.is_final());
    }

    #[test]
    fn test_decode_stream_event() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
        assert_eq!(
            decode_stream_event(Some("content_block_delta"), delta).unwrap(),
            StreamEvent::Text("Hello".into())
        );
        let json_delta = r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"a\""}}"#;
        assert_eq!(decode_stream_event(None, json_delta).unwrap(), StreamEvent::Skip);
        assert_eq!(
            decode_stream_event(Some("ping"), r#"{"type":"ping"}"#).unwrap(),
            StreamEvent::Skip
        );
        assert_eq!(
            decode_stream_event(Some("message_stop"), r#"{"type":"message_stop"}"#).unwrap(),
            StreamEvent::Done
        );
        let err = decode_stream_event(
            Some("error"),
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
