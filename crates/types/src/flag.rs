use serde_json::Value;

/// Coerces the loosely-typed completion flags the conversation backend emits.
///
/// `true`, the number `1`, and the strings `y`, `yes`, `true`, `1` (trimmed,
/// case-insensitive) are true. Everything else, including `null`, is false.
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "y" | "yes" | "true" | "1"
        ),
        Value::Number(number) => number.as_f64() == Some(1.0),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Same rule for an optional field, where an absent value is false.
pub fn coerce_optional_flag(value: Option<&Value>) -> bool {
    value.is_some_and(coerce_flag)
}
