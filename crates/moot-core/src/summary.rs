//! Derivation of one-line human summaries from opaque answer payloads.
//!
//! Answer payloads are type-specific JSON objects (see the catalog), but
//! findings and session summaries need a flat human-readable line per
//! answer. The derivation tries the well-known fields in a fixed order and
//! falls back to the first non-null value in the payload.

use serde_json::Value;

/// Maximum length of a summary derived from a `text` field.
const TEXT_SUMMARY_MAX: usize = 100;

/// Derive a one-line human summary from an answer payload.
///
/// Field order: `selected` (array joined with `", "`, string as-is),
/// `choice`, `text` (truncated at 100 chars), `value`; then the first
/// non-null value in the object; then `"unspecified"`.
#[must_use]
pub fn summarize_answer(answer: &Value) -> String {
    if let Some(selected) = answer.get("selected") {
        match selected {
            Value::Array(items) => {
                let joined: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                if !joined.is_empty() {
                    return joined.join(", ");
                }
            }
            Value::String(s) => return s.clone(),
            _ => {}
        }
    }

    if let Some(choice) = answer.get("choice").and_then(Value::as_str) {
        return choice.to_owned();
    }

    if let Some(text) = answer.get("text").and_then(Value::as_str) {
        return truncate_chars(text, TEXT_SUMMARY_MAX);
    }

    if let Some(value) = answer.get("value") {
        if !value.is_null() {
            return flatten_value(value);
        }
    }

    if let Some(obj) = answer.as_object() {
        if let Some(first) = obj.values().find(|v| !v.is_null()) {
            return flatten_value(first);
        }
    }

    "unspecified".to_owned()
}

/// Whether an answer is a bare "ready to proceed" affirmation, which
/// synthesis excludes from qualifier lists.
#[must_use]
pub fn is_affirmation(answer: &Value) -> bool {
    answer.get("choice").and_then(Value::as_str) == Some("yes")
}

/// Flatten an arbitrary JSON value to a short string.
fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(flatten_value).collect();
            parts.join(", ")
        }
        other => other.to_string(),
    }
}

/// Truncate a string to at most `max` characters (not bytes).
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
