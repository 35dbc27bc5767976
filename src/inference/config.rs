//! Chat configuration loading and validation.
//!
//! The core consumes a `ChatConfig` value object. It can be built in code or
//! read from `config/chat.yaml`, with environment-variable interpolation on
//! string values. The API key is not part of this file; it is handed to the
//! HTTP provider separately by the credential store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::InferenceError;

/// Environment variable that points directly at a config file.
pub const CONFIG_PATH_ENV: &str = "CHATPILOT_CONFIG";

/// Relative location searched for when walking up from a start directory.
const CONFIG_RELATIVE_PATH: &str = "config/chat.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Which provider wire format to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Claude => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Claude => "claude-3-5-haiku-latest",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider selection and model parameters for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Model id. Empty means the provider's default model.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// When `false`, no tools are offered and every turn is plain chat.
    #[serde(default = "default_tool_use_enabled")]
    pub tool_use_enabled: bool,
    /// Override for the provider endpoint (proxies, self-hosted gateways).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Extra instructions appended to the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_tool_use_enabled() -> bool {
    true
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_stream_timeout_secs() -> u64 {
    180
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::for_provider(default_provider())
    }
}

impl ChatConfig {
    /// Defaults for the given provider.
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            tool_use_enabled: default_tool_use_enabled(),
            base_url: None,
            system_prompt: None,
            request_timeout_secs: default_request_timeout_secs(),
            stream_timeout_secs: default_stream_timeout_secs(),
        }
    }

    /// The model id actually sent on the wire.
    pub fn effective_model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// The endpoint base URL, without a trailing slash.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    /// Reject values no provider would accept.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_tokens == 0 {
            return Err(InferenceError::ConfigError {
                reason: "max_tokens must be greater than zero".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InferenceError::ConfigError {
                reason: format!("temperature {} is outside 0.0..=2.0", self.temperature),
            });
        }
        if self.request_timeout_secs == 0 || self.stream_timeout_secs == 0 {
            return Err(InferenceError::ConfigError {
                reason: "timeouts must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the chat config file.
///
/// Checks `CHATPILOT_CONFIG` first, then searches upward from `start` for
/// `config/chat.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_PATH_ENV} points at a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!("could not find {CONFIG_RELATIVE_PATH}"),
    })
}

/// Load, interpolate and validate a chat config file.
///
/// String values matching `${VAR_NAME}` or `${VAR_NAME:-default}` are
/// resolved from the environment before parsing.
pub fn load_chat_config(path: &Path) -> Result<ChatConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let mut config: ChatConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    if config.model.trim().is_empty() {
        config.model = config.provider.default_model().to_string();
    }
    config.validate()?;

    tracing::info!(
        path = %path.display(),
        provider = %config.provider,
        model = %config.model,
        tool_use_enabled = config.tool_use_enabled,
        "loaded chat config"
    );

    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
