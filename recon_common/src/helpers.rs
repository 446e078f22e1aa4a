use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Clamp a user-supplied number into `[min, max]`, substituting `default` when no value is supplied.
pub fn clamp_or_default<T: PartialOrd + Copy>(value: Option<T>, default: T, min: T, max: T) -> T {
    let v = value.unwrap_or(default);
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/// Deserialize an optional string field from a request body. Values of any other JSON type are treated as absent, so
/// that one mistyped field does not make the rest of the body unreadable.
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// As [`deserialize_lenient_string`], for fields that default to the empty string.
pub fn deserialize_lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    Ok(deserialize_lenient_string(deserializer)?.unwrap_or_default())
}
