//! Boundary conversion of tool arguments into core values.

use serde_json::Value;

/// Interpret a `set_property` value.
///
/// Hosts often send structured values as strings. A string that parses as
/// JSON is replaced by the parsed value; any other string is kept verbatim.
/// Non-string values pass through unchanged.
pub fn parse_property_value(value: Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// Validate a brightness percentage, rounding fractional input.
pub fn brightness_percent(raw: Option<f64>) -> Result<Option<u8>, String> {
    match raw {
        None => Ok(None),
        Some(b) if b.is_finite() && (0.0..=100.0).contains(&b) => Ok(Some(b.round() as u8)),
        Some(b) => Err(format!("brightness must be between 0 and 100, got {b}")),
    }
}
