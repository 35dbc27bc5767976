//! Tool call parsing: normalizes each provider's native tool-call shape to
//! a canonical `ParsedToolCall`.
//!
//! 1. **OpenAI** returns `tool_calls[].function.arguments` as a JSON-encoded
//!    *string* that must be decoded.
//! 2. **Claude** returns `tool_use` content blocks whose `input` is already a
//!    JSON object.
//!
//! Neither path fails the reply. A call that cannot be decoded is returned as
//! `ParsedToolCall::Malformed` so the loop can acknowledge it with an error
//! result.

use uuid::Uuid;

use super::types::{arguments_from_json, ParsedToolCall, ToolCall};

/// Use the provider id, or generate one when missing.
fn resolve_call_id(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("call_{}", Uuid::new_v4()),
    }
}

/// Parse a tool call whose arguments arrive as a JSON string (OpenAI).
///
/// An empty string is treated as `{}`, which some models send for
/// zero-argument tools.
pub fn parse_json_string_arguments(
    id: Option<&str>,
    name: &str,
    arguments_json: &str,
) -> ParsedToolCall {
    let call_id = resolve_call_id(id);
    let raw = if arguments_json.trim().is_empty() {
        "{}"
    } else {
        arguments_json
    };

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => parse_object_arguments(Some(&call_id), name, &value),
        Err(e) => {
            tracing::warn!(
                tool = %name,
                call_id = %call_id,
                raw = %arguments_json,
                error = %e,
                "tool call arguments are not valid JSON"
            );
            ParsedToolCall::Malformed {
                id: call_id,
                name: name.to_string(),
                reason: format!("invalid JSON arguments: {e}"),
            }
        }
    }
}

/// Parse a tool call whose arguments arrive as a JSON value (Claude).
pub fn parse_object_arguments(
    id: Option<&str>,
    name: &str,
    input: &serde_json::Value,
) -> ParsedToolCall {
    let call_id = resolve_call_id(id);

    if name.is_empty() {
        return ParsedToolCall::Malformed {
            id: call_id,
            name: String::new(),
            reason: "empty tool name".into(),
        };
    }

    match arguments_from_json(input) {
        Ok(arguments) => ParsedToolCall::Valid(ToolCall {
            id: call_id,
            name: name.to_string(),
            arguments,
        }),
        Err(reason) => {
            tracing::warn!(tool = %name, call_id = %call_id, reason = %reason, "unsupported tool call arguments");
            ParsedToolCall::Malformed {
                id: call_id,
                name: name.to_string(),
                reason,
            }
        }
    }
}
