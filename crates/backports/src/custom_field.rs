//! Best-effort extraction of display names from multi-valued custom fields.
//!
//! The tracker serializes version-like custom fields inconsistently: a list of
//! objects, a single object, objects nested inside other objects, or a
//! pre-rendered string such as `[map[id:1 name:4.19.0]]`. Rather than
//! decoding a fixed schema, every embedded `name` entry is scraped, wherever
//! it appears. Anything unrecognised contributes nothing, so the worst case is
//! an empty string rather than an error.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Separator between extracted names.
pub const NAME_SEPARATOR: &str = ", ";

/// Matches `name:VALUE` / `name=VALUE` tokens inside rendered text.
static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s\[{,(])"?name"?\s*[:=]\s*"?([^\s\]}",)]+)"#)
        .unwrap_or_else(|e| panic!("invalid name token pattern: {e}"))
});

/// Extract every embedded name from `value`, sorted descending and joined
/// with `", "`.
///
/// The sort is plain lexicographic, not version-aware. An absent, null or
/// nameless value yields an empty string.
///
/// # Example
///
/// ```
/// use backports::custom_field::extract_names;
/// use serde_json::json;
///
/// let field = json!([{"name": "4.18.0"}, {"name": "4.19.0"}]);
/// assert_eq!(extract_names(Some(&field)), "4.19.0, 4.18.0");
/// assert_eq!(extract_names(None), "");
/// ```
pub fn extract_names(value: Option<&Value>) -> String {
    let mut names = Vec::new();
    if let Some(value) = value {
        collect_names(value, &mut names);
    }
    names.sort_by(|a, b| b.cmp(a));
    names.join(NAME_SEPARATOR)
}

fn collect_names(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                match (key.as_str(), entry) {
                    ("name", Value::String(name)) => push_name(names, name),
                    ("name", Value::Number(n)) => names.push(n.to_string()),
                    _ => collect_names(entry, names),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_names(item, names)),
        Value::String(text) => scrape_text(text, names),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn scrape_text(text: &str, names: &mut Vec<String>) {
    for captures in NAME_TOKEN.captures_iter(text) {
        if let Some(name) = captures.get(1) {
            push_name(names, name.as_str());
        }
    }
}

fn push_name(names: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() {
        names.push(name.to_string());
    }
}
