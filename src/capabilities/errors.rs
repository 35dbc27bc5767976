//! Capability error types.

use thiserror::Error;

/// Errors reported by capability providers and the capability router.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapabilityError {
    /// Tool not owned by any registered provider.
    #[error("unknown tool: '{name}'")]
    UnknownTool {
        name: String,
    },

    /// Two providers declare the same tool name.
    #[error("tool '{name}' is declared by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },

    /// A required argument is absent or null.
    #[error("invalid arguments for '{tool}': missing required field '{field}'")]
    MissingArgument {
        tool: String,
        field: String,
    },

    /// An argument has the wrong type or an unusable value.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArgument {
        tool: String,
        reason: String,
    },

    /// The platform denied access to the underlying resource.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        reason: String,
    },

    /// The referenced record does not exist.
    #[error("{kind} not found: '{id}'")]
    NotFound {
        kind: String,
        id: String,
    },

    /// Any other failure inside the wrapped platform operation.
    #[error("platform error: {reason}")]
    Platform {
        reason: String,
    },
}

impl CapabilityError {
    /// Whether this error was caused by the arguments rather than execution.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            CapabilityError::MissingArgument { .. } | CapabilityError::InvalidArgument { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_permission_denied() {
        let err = CapabilityError::PermissionDenied {
            reason: "calendar access not granted".into(),
        };
        assert_eq!(err.to_string(), "permission denied: calendar access not granted");
    }

    #[test]
    fn test_is_argument_error() {
        let missing = CapabilityError::MissingArgument {
            tool: "create_event".into(),
            field: "title".into(),
        };
        assert!(missing.is_argument_error());
        assert!(!CapabilityError::Platform { reason: "x".into() }.is_argument_error());
    }
}
