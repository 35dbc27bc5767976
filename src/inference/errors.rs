//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility. These types carry the context needed to build
//! meaningful log entries and to feed the error classifier.

use thiserror::Error;

/// Errors that can occur while talking to an LLM provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/TLS connection to the provider endpoint failed or was dropped.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// DNS resolution of the provider host failed.
    #[error("could not resolve host for {endpoint}")]
    HostUnresolved {
        endpoint: String,
    },

    /// The provider did not respond within the configured timeout.
    #[error("request timeout after {duration_secs}s")]
    Timeout {
        duration_secs: u64,
    },

    /// Non-2xx HTTP response from the provider.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The response body could not be decoded into the provider's shape.
    #[error("malformed provider response: {reason}")]
    MalformedResponse {
        reason: String,
    },

    /// SSE stream parsing or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError {
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl InferenceError {
    /// HTTP status code, if this error came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Extract the error body text, if this is an `HttpError`.
    pub fn error_body(&self) -> Option<&str> {
        match self {
            InferenceError::HttpError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Best-effort human-readable provider message.
    ///
    /// Both providers wrap failures as `{"error": {"message": "..."}}`. When
    /// the body has that shape the inner message is returned, otherwise the
    /// display string of the error itself.
    pub fn provider_message(&self) -> String {
        if let Some(body) = self.error_body() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
                if let Some(msg) = value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                {
                    return msg.to_string();
                }
            }
        }
        self.to_string()
    }
}
