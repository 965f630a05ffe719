//! Lenient readers for model-produced JSON.
//!
//! Models drift: numbers arrive as strings, lists as comma-separated text,
//! objects where a name was asked for. These helpers absorb that.

use serde_json::Value;

/// String field; numbers and booleans are stringified
pub fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Optional non-empty string field
pub fn opt_text(value: &Value, key: &str) -> Option<String> {
    Some(text(value, key)).filter(|s| !s.is_empty())
}

/// Numeric field, accepting numeric strings such as `"0.8"` or `"75%"`
pub fn number(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
                None => trimmed.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Boolean field, accepting `"yes"`/`"true"` strings
pub fn flag(value: &Value, key: &str) -> Option<bool> {
    match value.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "valid" => Some(true),
            "false" | "no" | "invalid" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// List of strings. Objects contribute their `name`/`title` field and a
/// plain string is split on commas.
pub fn strings(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => opt_text(item, "name").or_else(|| opt_text(item, "title")),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// List of arbitrary items; a single object becomes a one-item list
pub fn list(value: &Value, key: &str) -> Vec<Value> {
    match value.get(key) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// Sub-object, or `Null`
pub fn object(value: &Value, key: &str) -> Value {
    match value.get(key) {
        Some(v @ Value::Object(_)) => v.clone(),
        _ => Value::Null,
    }
}

/// Map a confidence label or number onto 0.0 - 1.0
pub fn confidence(value: &Value, key: &str) -> Option<f64> {
    if let Some(n) = number(value, key) {
        let scaled = if n > 1.0 { n / 100.0 } else { n };
        return Some(scaled.clamp(0.0, 1.0));
    }
    label_confidence(&text(value, key))
}

/// `high` / `medium` / `low` as a number
pub fn label_confidence(label: &str) -> Option<f64> {
    match label.trim().to_ascii_lowercase().as_str() {
        "high" => Some(0.9),
        "medium" => Some(0.6),
        "low" => Some(0.3),
        _ => None,
    }
}
