//! SSE stream parsing for streaming chat replies.
//!
//! Both providers frame their output as server-sent events, but the
//! envelopes differ:
//!
//! - **OpenAI**: `data: {"choices":[{"delta":{"content":"..."}}]}` frames,
//!   terminated by `data: [DONE]`.
//! - **Claude**: `event: <type>` + `data: {...}` frames; text arrives in
//!   `content_block_delta` events, terminated by `message_stop`.
//!
//! The parser collapses either framing into an ordered stream of plain text
//! deltas. No tool calling happens on this path.

use futures::stream::{self, Stream, StreamExt};

use super::claude;
use super::config::ProviderKind;
use super::errors::InferenceError;
use super::openai;
use super::types::StreamEvent;

/// One raw SSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Parse the text of one SSE event block (lines between blank lines).
///
/// Returns `None` for blocks with no `data:` line (comments, keep-alives).
pub fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut has_data = false;

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            frame.event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            if has_data {
                frame.data.push('\n');
            }
            frame.data.push_str(value.strip_prefix(' ').unwrap_or(value));
            has_data = true;
        }
    }

    has_data.then_some(frame)
}

/// Decode one frame with the provider's envelope rules.
fn decode_frame(provider: ProviderKind, frame: &SseFrame) -> Result<StreamEvent, InferenceError> {
    match provider {
        ProviderKind::OpenAi => openai::decode_stream_data(&frame.data),
        ProviderKind::Claude => claude::decode_stream_event(frame.event.as_deref(), &frame.data),
    }
}

/// Split off the next complete event block, accepting `\n\n` and `\r\n\r\n`.
fn take_block(buffer: &mut String) -> Option<String> {
    let (end, sep_len) = match (buffer.find("\n\n"), buffer.find("\r\n\r\n")) {
        (Some(a), Some(b)) if b < a => (b, 4),
        (Some(a), _) => (a, 2),
        (None, Some(b)) => (b, 4),
        (None, None) => return None,
    };
    let block = buffer[..end].to_string();
    buffer.drain(..end + sep_len);
    Some(block)
}

/// Convert a byte stream of SSE frames into an ordered stream of text deltas.
///
/// The stream ends after the provider's completion marker, after the first
/// error, or when the underlying byte stream closes.
pub fn parse_text_stream<S, B, E>(
    byte_stream: S,
    provider: ProviderKind,
) -> impl Stream<Item = Result<String, InferenceError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    // Raw bytes are held until a full block arrives so multi-byte characters
    // split across chunks decode intact.
    let state = (byte_stream, Vec::<u8>::new(), String::new(), false);

    stream::unfold(
        state,
        move |(mut byte_stream, mut raw, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                if let Some(block) = take_block(&mut buffer) {
                    let Some(frame) = parse_frame(&block) else {
                        continue;
                    };
                    match decode_frame(provider, &frame) {
                        Ok(StreamEvent::Text(text)) => {
                            return Some((Ok(text), (byte_stream, raw, buffer, done)));
                        }
                        Ok(StreamEvent::Done) => {
                            tracing::debug!(provider = %provider, "stream completion marker received");
                            return None;
                        }
                        Ok(StreamEvent::Skip) => continue,
                        Err(e) => {
                            done = true;
                            return Some((Err(e), (byte_stream, raw, buffer, done)));
                        }
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        raw.extend_from_slice(bytes.as_ref());
                        let valid_up_to = match std::str::from_utf8(&raw) {
                            Ok(s) => s.len(),
                            Err(e) => e.valid_up_to(),
                        };
                        buffer.push_str(&String::from_utf8_lossy(&raw[..valid_up_to]));
                        raw.drain(..valid_up_to);
                    }
                    Some(Err(e)) => {
                        done = true;
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, raw, buffer, done),
                        ));
                    }
                    None => {
                        // Flush a trailing block that had no closing blank line.
                        done = true;
                        let tail = buffer.trim();
                        if tail.is_empty() {
                            tracing::warn!(provider = %provider, "stream closed without completion marker");
                            return None;
                        }
                        let frame = parse_frame(tail);
                        buffer.clear();
                        return match frame.map(|f| decode_frame(provider, &f)) {
                            Some(Ok(StreamEvent::Text(text))) => {
                                Some((Ok(text), (byte_stream, raw, buffer, done)))
                            }
                            Some(Err(e)) => Some((Err(e), (byte_stream, raw, buffer, done))),
                            _ => None,
                        };
                    }
                }
            }
        },
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
