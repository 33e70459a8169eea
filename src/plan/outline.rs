//! Outline and title parsing for generator responses.
//!
//! Generators are asked for JSON and frequently wrap it in a markdown fence or
//! return objects instead of plain strings; both shapes are accepted here.

use serde_json::Value;

/// Structure used when no usable outline is available.
pub const DEFAULT_STRUCTURE: [&str; 5] = [
    "Introduction",
    "Background",
    "Core Concepts",
    "Applications",
    "Summary",
];

/// Upper bound on title suggestions kept from a response.
pub const MAX_TITLE_SUGGESTIONS: usize = 5;

pub fn default_structure() -> Vec<String> {
    DEFAULT_STRUCTURE.iter().map(|s| s.to_string()).collect()
}

/// Removes a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses section titles from a JSON outline.
///
/// Accepts `["a", "b"]`, `[{"title": "a"}]`, or `{"sections": [...]}`.
/// Returns `None` when nothing usable is found.
pub fn parse_outline(text: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(strip_code_fence(text)).ok()?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("sections")
            .or_else(|| map.get("steps"))
            .and_then(Value::as_array)?,
        _ => return None,
    };
    let titles: Vec<String> = items.iter().filter_map(item_title).collect();
    (!titles.is_empty()).then_some(titles)
}

/// Parses a JSON list of title suggestions; falls back to the topic itself.
pub fn parse_title_suggestions(text: &str, topic: &str) -> Vec<String> {
    let parsed = serde_json::from_str::<Value>(strip_code_fence(text))
        .ok()
        .and_then(|value| match value {
            Value::Array(items) => Some(items),
            Value::Object(mut map) => match map.remove("titles") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        })
        .map(|items| {
            items
                .iter()
                .filter_map(item_title)
                .take(MAX_TITLE_SUGGESTIONS)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        vec![topic.trim().to_string()]
    } else {
        parsed
    }
}

fn item_title(item: &Value) -> Option<String> {
    let title = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("title").and_then(Value::as_str)?,
        _ => return None,
    };
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
