//! Tool definitions shared by capability providers, the router and the
//! provider wire formats.

use serde::{Deserialize, Serialize};

use super::errors::CapabilityError;
use crate::inference::types::{ArgValue, ToolArguments};

// ─── Capability Domain ───────────────────────────────────────────────────────

/// Which platform resource a capability provider wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityDomain {
    Calendar,
    Reminders,
}

impl CapabilityDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityDomain::Calendar => "calendar",
            CapabilityDomain::Reminders => "reminders",
        }
    }
}

impl std::fmt::Display for CapabilityDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tool ────────────────────────────────────────────────────────────────────

/// Semantic type of a tool parameter. Serializes to the JSON-schema name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Number,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Number => "number",
        }
    }

    /// Whether `value` is acceptable for this declared type.
    ///
    /// Integers satisfy `number`, and integral floats satisfy `integer`.
    fn accepts(&self, value: &ArgValue) -> bool {
        match self {
            ParameterType::String => matches!(value, ArgValue::String(_)),
            ParameterType::Boolean => matches!(value, ArgValue::Boolean(_)),
            ParameterType::Integer => value.as_i64().is_some(),
            ParameterType::Number => value.as_f64().is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterType,
    pub description: String,
}

/// A provider-agnostic, immutable description of one callable capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<ToolParameter>,
    pub required: Vec<String>,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Add a required parameter.
    pub fn param(mut self, name: &str, kind: ParameterType, description: &str) -> Self {
        self.required.push(name.to_string());
        self.optional_param(name, kind, description)
    }

    /// Add an optional parameter.
    pub fn optional_param(mut self, name: &str, kind: ParameterType, description: &str) -> Self {
        self.parameters.push(ToolParameter {
            name: name.to_string(),
            kind,
            description: description.to_string(),
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON-schema `{type: object, properties, required}` shared by both
    /// provider wire formats.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.kind.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    /// Check arguments against the declared parameters.
    ///
    /// Required parameters must be present and non-null. Present arguments
    /// must match their declared type (null is allowed for optional ones).
    /// Undeclared arguments are ignored.
    pub fn validate_arguments(&self, args: &ToolArguments) -> Result<(), CapabilityError> {
        for field in &self.required {
            let present = args.get(field).map(|v| !v.is_null()).unwrap_or(false);
            if !present {
                return Err(CapabilityError::MissingArgument {
                    tool: self.name.clone(),
                    field: field.clone(),
                });
            }
        }

        for (name, value) in args {
            let Some(param) = self.parameter(name) else {
                tracing::debug!(tool = %self.name, argument = %name, "ignoring undeclared argument");
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !param.kind.accepts(value) {
                return Err(CapabilityError::InvalidArgument {
                    tool: self.name.clone(),
                    reason: format!(
                        "'{name}' must be {}, got {}",
                        param.kind.as_str(),
                        value.type_name()
                    ),
                });
            }
        }

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn create_event_tool() -> Tool {
        Tool::new("create_event", "Create a calendar event")
            .param("title", ParameterType::String, "Event title")
            .param("start", ParameterType::String, "Start time")
            .optional_param("duration_minutes", ParameterType::Integer, "Length")
            .optional_param("all_day", ParameterType::Boolean, "All-day event")
    }

    fn args(pairs: &[(&str, ArgValue)]) -> ToolArguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parameters_schema_shape() {
        let schema = create_event_tool().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["title"]["type"], "string");
        assert_eq!(schema["properties"]["duration_minutes"]["type"], "integer");
        assert_eq!(schema["required"], serde_json::json!(["title", "start"]));
    }

    #[test]
    fn test_validate_ok() {
        let tool = create_event_tool();
        let a = args(&[
            ("title", ArgValue::String("Lunch".into())),
            ("start", ArgValue::String("2026-10-20 12:00".into())),
            ("duration_minutes", ArgValue::Number(45.0)),
            ("extra", ArgValue::Boolean(true)),
        ]);
        assert!(tool.validate_arguments(&a).is_ok());
    }

    #[test]
    fn test_validate_missing_required() {
        let tool = create_event_tool();
        let a = args(&[("title", ArgValue::String("Lunch".into()))]);
        let err = tool.validate_arguments(&a).unwrap_err();
        assert_eq!(
            err,
            CapabilityError::MissingArgument {
                tool: "create_event".into(),
                field: "start".into()
            }
        );
    }

    #[test]
    fn test_validate_null_required_counts_as_missing() {
        let tool = create_event_tool();
        let a = args(&[
            ("title", ArgValue::Null),
            ("start", ArgValue::String("tomorrow".into())),
        ]);
        assert!(matches!(
            tool.validate_arguments(&a),
            Err(CapabilityError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let tool = create_event_tool();
        let a = args(&[
            ("title", ArgValue::String("Lunch".into())),
            ("start", ArgValue::String("noon".into())),
            ("all_day", ArgValue::String("yes".into())),
        ]);
        let err = tool.validate_arguments(&a).unwrap_err();
        assert!(err.to_string().contains("'all_day' must be boolean, got string"));
    }

    #[test]
    fn test_validate_fractional_integer_rejected() {
        let tool = create_event_tool();
        let a = args(&[
            ("title", ArgValue::String("Lunch".into())),
            ("start", ArgValue::String("noon".into())),
            ("duration_minutes", ArgValue::Number(1.5)),
        ]);
        assert!(tool.validate_arguments(&a).is_err());
    }
}
