//! Provider failure classification.
//!
//! Maps a raw failure signal (transport code, HTTP status, message text) to a
//! small category used for user messaging and the retry affordance. The
//! classifier never influences orchestration control flow.

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;

// ─── Public Types ────────────────────────────────────────────────────────────

/// Transport-layer failure codes reported below HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCode {
    ConnectionLost,
    TimedOut,
    HostUnresolved,
}

/// The raw signal a failure is classified from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawError {
    pub transport: Option<TransportCode>,
    pub status: Option<u16>,
    pub message: String,
}

impl RawError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            transport: None,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            transport: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn from_transport(code: TransportCode) -> Self {
        Self {
            transport: Some(code),
            status: None,
            message: String::new(),
        }
    }
}

/// Coarse failure category surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Network,
    Authentication,
    RateLimit,
    ServerError,
    Unknown,
}

impl ErrorCategory {
    /// Fixed user-facing guidance for this category.
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorCategory::Network => {
                "Unable to reach the AI service. Check your internet connection and try again."
            }
            ErrorCategory::Authentication => {
                "Your API key was rejected. Check the key in Settings and try again."
            }
            ErrorCategory::RateLimit => {
                "The AI service is receiving too many requests. Wait a moment and try again."
            }
            ErrorCategory::ServerError => {
                "The AI service is having problems right now. Please try again later."
            }
            ErrorCategory::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Whether re-sending the same prompt can plausibly succeed.
    ///
    /// A rejected key keeps failing until the user fixes it.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Authentication)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimit => "rateLimit",
            ErrorCategory::ServerError => "serverError",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Classification ──────────────────────────────────────────────────────────

const AUTH_KEYWORDS: &[&str] = &["unauthorized", "invalid api key", "invalid x-api-key"];
const RATE_LIMIT_KEYWORDS: &[&str] = &["rate limit", "rate_limit", "too many requests"];
const SERVER_KEYWORDS: &[&str] = &["server", "overloaded"];
const NETWORK_KEYWORDS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "network",
    "offline",
    "could not resolve host",
];

/// Classify a raw failure. Rules are checked in precedence order and the
/// first match wins.
pub fn classify(raw: &RawError) -> ErrorCategory {
    let message = raw.message.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if raw.transport.is_some() {
        return ErrorCategory::Network;
    }
    if raw.status == Some(401) || mentions(AUTH_KEYWORDS) {
        return ErrorCategory::Authentication;
    }
    if raw.status == Some(429) || mentions(RATE_LIMIT_KEYWORDS) {
        return ErrorCategory::RateLimit;
    }
    if matches!(raw.status, Some(500..=599)) || mentions(SERVER_KEYWORDS) {
        return ErrorCategory::ServerError;
    }
    if mentions(NETWORK_KEYWORDS) {
        return ErrorCategory::Network;
    }
    ErrorCategory::Unknown
}

impl From<&InferenceError> for RawError {
    fn from(err: &InferenceError) -> Self {
        let transport = match err {
            InferenceError::ConnectionFailed { .. } => Some(TransportCode::ConnectionLost),
            InferenceError::HostUnresolved { .. } => Some(TransportCode::HostUnresolved),
            InferenceError::Timeout { .. } => Some(TransportCode::TimedOut),
            _ => None,
        };
        Self {
            transport,
            status: err.status(),
            message: err.provider_message(),
        }
    }
}

/// Classify an inference error directly.
pub fn classify_inference_error(err: &InferenceError) -> ErrorCategory {
    let category = classify(&RawError::from(err));
    tracing::debug!(category = %category, error = %err, "classified provider failure");
    category
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_codes_are_network() {
        for code in [
            TransportCode::ConnectionLost,
            TransportCode::TimedOut,
            TransportCode::HostUnresolved,
        ] {
            assert_eq!(classify(&RawError::from_transport(code)), ErrorCategory::Network);
        }
    }

    #[test]
    fn test_transport_code_beats_status() {
        let raw = RawError {
            transport: Some(TransportCode::TimedOut),
            status: Some(401),
            message: "unauthorized".into(),
        };
        assert_eq!(classify(&raw), ErrorCategory::Network);
    }

    #[test]
    fn test_authentication() {
        assert_eq!(classify(&RawError::from_status(401, "")), ErrorCategory::Authentication);
        assert_eq!(
            classify(&RawError::from_message("Invalid API key provided")),
            ErrorCategory::Authentication
        );
        assert_eq!(
            classify(&RawError::from_message("Unauthorized")),
            ErrorCategory::Authentication
        );
    }

    #[test]
    fn test_auth_keyword_beats_server_status() {
        let raw = RawError::from_status(500, "unauthorized upstream");
        assert_eq!(classify(&raw), ErrorCategory::Authentication);
    }

    #[test]
    fn test_rate_limit() {
        assert_eq!(classify(&RawError::from_status(429, "")), ErrorCategory::RateLimit);
        assert_eq!(
            classify(&RawError::from_message("Rate limit reached for requests")),
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_server_error() {
        assert_eq!(classify(&RawError::from_status(503, "")), ErrorCategory::ServerError);
        assert_eq!(classify(&RawError::from_status(529, "")), ErrorCategory::ServerError);
        assert_eq!(
            classify(&RawError::from_message("internal server error")),
            ErrorCategory::ServerError
        );
    }

    #[test]
    fn test_network_keyword_fallback() {
        assert_eq!(
            classify(&RawError::from_message("The network connection was lost.")),
            ErrorCategory::Network
        );
        assert_eq!(
            classify(&RawError::from_message("request timed out")),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify(&RawError::from_status(404, "not found")), ErrorCategory::Unknown);
        assert_eq!(classify(&RawError::default()), ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let signals = [
            RawError::from_status(401, ""),
            RawError::from_status(429, "slow down"),
            RawError::from_message("connection reset"),
            RawError::from_message("bad request"),
        ];
        for raw in &signals {
            let first = classify(raw);
            for _ in 0..10 {
                assert_eq!(classify(raw), first);
            }
        }
    }

    #[test]
    fn test_classify_inference_errors() {
        let timeout = InferenceError::Timeout { duration_secs: 60 };
        assert_eq!(classify_inference_error(&timeout), ErrorCategory::Network);

        let auth = InferenceError::HttpError {
            status: 401,
            body: r#"{"error":{"message":"invalid x-api-key"}}"#.into(),
        };
        assert_eq!(classify_inference_error(&auth), ErrorCategory::Authentication);

        let overloaded = InferenceError::HttpError {
            status: 529,
            body: r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#
                .into(),
        };
        assert_eq!(classify_inference_error(&overloaded), ErrorCategory::ServerError);
    }

    #[test]
    fn test_guidance_and_retry() {
        assert!(!ErrorCategory::Authentication.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::RateLimit.guidance().contains("too many requests"));
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rateLimit");
    }
}
