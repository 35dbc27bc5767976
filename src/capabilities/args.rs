//! Argument helpers shared by the built-in capability providers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use super::errors::CapabilityError;
use crate::inference::types::ToolArguments;

/// Display format for timestamps in tool output.
pub(crate) const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a ToolArguments,
    field: &str,
) -> Result<&'a str, CapabilityError> {
    match optional_str(args, field) {
        Some(value) => Ok(value),
        None => Err(CapabilityError::MissingArgument {
            tool: tool.to_string(),
            field: field.to_string(),
        }),
    }
}

/// Non-empty string argument, if present.
pub(crate) fn optional_str<'a>(args: &'a ToolArguments, field: &str) -> Option<&'a str> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn optional_bool(args: &ToolArguments, field: &str) -> Option<bool> {
    args.get(field).and_then(|v| v.as_bool())
}

/// Optional integer argument; present but not an `i64` is an error.
pub(crate) fn optional_i64(
    tool: &str,
    args: &ToolArguments,
    field: &str,
) -> Result<Option<i64>, CapabilityError> {
    match args.get(field).filter(|v| !v.is_null()) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| CapabilityError::InvalidArgument {
            tool: tool.to_string(),
            reason: format!("'{field}' must be an integer, got {}", value.type_name()),
        }),
    }
}

/// Parse a model-supplied timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` and a
/// bare `YYYY-MM-DD` (midnight). Offsets are dropped; times are local.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Required timestamp argument.
pub(crate) fn required_datetime(
    tool: &str,
    args: &ToolArguments,
    field: &str,
) -> Result<NaiveDateTime, CapabilityError> {
    let raw = required_str(tool, args, field)?;
    parse_datetime(raw).ok_or_else(|| invalid_datetime(tool, field, raw))
}

/// Optional timestamp argument; present-but-unparseable is an error.
pub(crate) fn optional_datetime(
    tool: &str,
    args: &ToolArguments,
    field: &str,
) -> Result<Option<NaiveDateTime>, CapabilityError> {
    match optional_str(args, field) {
        Some(raw) => parse_datetime(raw)
            .map(Some)
            .ok_or_else(|| invalid_datetime(tool, field, raw)),
        None => Ok(None),
    }
}

/// `start` shifted by `offset`, or an `InvalidArgument` naming `field` when
/// the result falls outside chrono's range.
pub(crate) fn shifted(
    tool: &str,
    start: NaiveDateTime,
    offset: Option<Duration>,
    field: &str,
) -> Result<NaiveDateTime, CapabilityError> {
    offset
        .and_then(|d| start.checked_add_signed(d))
        .ok_or_else(|| CapabilityError::InvalidArgument {
            tool: tool.to_string(),
            reason: format!("'{field}' is out of range"),
        })
}

fn invalid_datetime(tool: &str, field: &str, raw: &str) -> CapabilityError {
    CapabilityError::InvalidArgument {
        tool: tool.to_string(),
        reason: format!("'{field}' is not a valid date/time: '{raw}' (expected YYYY-MM-DD HH:MM)"),
    }
}

/// Case-insensitive keyword hint used by `can_handle`.
pub(crate) fn mentions_any(message: &str, keywords: &[&str]) -> bool {
    let lower = message.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::ArgValue;

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2026-10-20 15:00"), Some(expected));
        assert_eq!(parse_datetime("2026-10-20T15:00:00"), Some(expected));
        assert_eq!(parse_datetime("2026-10-20T15:00:00+02:00"), Some(expected));
        assert_eq!(
            parse_datetime("2026-10-20"),
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_datetime("tomorrow at noon"), None);
    }

    #[test]
    fn test_required_str_rejects_blank() {
        let mut args = ToolArguments::new();
        args.insert("title".into(), ArgValue::String("   ".into()));
        assert!(matches!(
            required_str("create_event", &args, "title"),
            Err(CapabilityError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_shifted_reports_overflow() {
        let start = parse_datetime("2026-10-20 12:00").unwrap();
        assert_eq!(
            shifted("create_event", start, Duration::try_minutes(90), "duration_minutes").unwrap(),
            parse_datetime("2026-10-20 13:30").unwrap()
        );

        let err = shifted("create_event", start, Duration::try_minutes(i64::MAX), "duration_minutes")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid arguments for 'create_event': 'duration_minutes' is out of range"
        );

        let near_max = NaiveDateTime::MAX;
        assert!(shifted("create_event", near_max, Some(Duration::days(1)), "start").is_err());
    }

    #[test]
    fn test_optional_datetime_invalid() {
        let mut args = ToolArguments::new();
        args.insert("due".into(), ArgValue::String("soon".into()));
        let err = optional_datetime("create_reminder", &args, "due").unwrap_err();
        assert!(err.to_string().contains("'due' is not a valid date/time"));
    }
}
