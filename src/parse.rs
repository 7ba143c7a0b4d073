//! Structured output parsing for generation responses.
//!
//! Generation backends wrap JSON answers inconsistently: fenced code blocks
//! (with or without a language tag), leading prose, trailing commentary, or
//! nothing at all. [`extract_json`] peels those wrappers off with a layered
//! strategy, in order of preference:
//!
//! 1. Fenced-block scan — take the first fenced segment whose content
//!    starts with `{`, skipping an optional language tag line.
//! 2. Line-oriented fence strip — when the whole text starts with a fence,
//!    drop the opening and closing fence lines.
//! 3. Balanced-brace extraction — find the first `{` and scan forward with
//!    a depth counter until it closes, discarding trailing text.
//! 4. Pass-through — return the text unchanged; strict decoding then fails
//!    with a predictable error instead of a guess.
//!
//! Decoding is two-phase: a permissive [`serde_json::Value`] decode first
//! ([`parse_value`]), then named normalization rules for known shape
//! variants ([`normalize_script_value`]), then strict typed construction at
//! the call site. Failing closed is deliberate: a decode error is always
//! preferred over guessing at malformed JSON.

use anyhow::{Context, Result};
use serde_json::Value;

/// Pull a candidate JSON document out of raw model text.
///
/// The result is unvalidated; callers decode it strictly and treat a decode
/// failure as a parse failure of the whole response.
pub fn extract_json(raw: &str) -> String {
    let text = raw.trim();

    // Fenced-block scan: segments at odd indices sit between fences.
    if text.contains("```") {
        let parts: Vec<&str> = text.split("```").collect();
        let mut index = 1;
        while index < parts.len() {
            let candidate = strip_language_tag(parts[index]).trim();
            if candidate.starts_with('{') {
                return candidate.to_string();
            }
            index += 2;
        }
    }

    // Line-oriented fallback for a fence the scan could not pair up.
    if text.starts_with("```") {
        let mut lines: Vec<&str> = text.lines().collect();
        lines.remove(0);
        if let Some(last) = lines.last() {
            if last.trim_start().starts_with("```") {
                lines.pop();
            }
        }
        return lines.join("\n").trim().to_string();
    }

    // Balanced-brace extraction from the first `{`.
    if !text.starts_with('{') {
        if let Some(start) = text.find('{') {
            let mut depth = 0usize;
            for (offset, ch) in text[start..].char_indices() {
                match ch {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return text[start..start + offset + ch.len_utf8()].to_string();
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    text.to_string()
}

/// Drop a language tag (`json`, `JSON`, ...) from the first line of a
/// fenced segment.
fn strip_language_tag(segment: &str) -> &str {
    let trimmed = segment.trim_start();
    if let Some(first_line) = trimmed.lines().next() {
        let tag = first_line.trim();
        if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphabetic()) {
            return &trimmed[first_line.len()..];
        }
    }
    segment
}

/// Extract and decode a response into a permissive JSON value.
pub fn parse_value(raw: &str) -> Result<Value> {
    let candidate = extract_json(raw);
    serde_json::from_str(&candidate).with_context(|| "response did not contain a valid JSON object")
}

/// Coalesce known list-shaped fields into the strings the typed model
/// expects.
///
/// Rules, applied to every entry of a top-level `sections` array:
/// - a `notes` list joins into one string with single spaces;
/// - a `content` list joins into one string with newlines.
pub fn normalize_script_value(value: &mut Value) {
    let Some(sections) = value.get_mut("sections").and_then(Value::as_array_mut) else {
        return;
    };
    for section in sections {
        join_list_field(section, "notes", " ");
        join_list_field(section, "content", "\n");
    }
}

fn join_list_field(object: &mut Value, field: &str, separator: &str) {
    let Some(entries) = object.get(field).and_then(Value::as_array) else {
        return;
    };
    let joined = entries
        .iter()
        .map(|entry| match entry {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator);
    object[field] = Value::String(joined);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_with_language_tag() {
        let raw = "Here you go:\n```json\n{\"topic\": \"hooks\"}\n```\nHope that helps!";
        assert_eq!(extract_json(raw), "{\"topic\": \"hooks\"}");
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let raw = "```\n{\"topic\": \"hooks\"}\n```";
        assert_eq!(extract_json(raw), "{\"topic\": \"hooks\"}");
    }

    #[test]
    fn test_leading_prose_before_object() {
        let raw = "Sure! The calendar is {\"briefs\": [{\"day\": 1}]} as requested.";
        assert_eq!(extract_json(raw), "{\"briefs\": [{\"day\": 1}]}");
    }

    #[test]
    fn test_nested_braces_balanced() {
        let raw = "prefix {\"a\": {\"b\": {\"c\": 1}}} suffix";
        assert_eq!(extract_json(raw), "{\"a\": {\"b\": {\"c\": 1}}}");
    }

    #[test]
    fn test_bare_json_passes_through() {
        let raw = "{\"ok\": true}";
        assert_eq!(extract_json(raw), raw);
    }

    #[test]
    fn test_no_object_returns_text_unchanged() {
        let raw = "I could not produce the JSON you asked for.";
        assert_eq!(extract_json(raw), raw);
        assert!(parse_value(raw).is_err());
    }

    #[test]
    fn test_second_fenced_segment_wins_when_first_has_no_object() {
        let raw = "```text\nnot json\n```\nand then\n```json\n{\"day\": 2}\n```";
        assert_eq!(extract_json(raw), "{\"day\": 2}");
    }

    #[test]
    fn test_parse_value_decodes_extracted_candidate() {
        let raw = "```json\n{\"hook\": \"Stop scrolling\"}\n```";
        let value = parse_value(raw).unwrap();
        assert_eq!(value["hook"], "Stop scrolling");
    }

    #[test]
    fn test_normalize_joins_notes_with_spaces() {
        let mut value = serde_json::json!({
            "sections": [
                {"title": "Intro", "content": "hi", "notes": ["close-up", "fast cuts"]}
            ]
        });
        normalize_script_value(&mut value);
        assert_eq!(value["sections"][0]["notes"], "close-up fast cuts");
    }

    #[test]
    fn test_normalize_joins_content_with_newlines() {
        let mut value = serde_json::json!({
            "sections": [
                {"title": "Body", "content": ["line one", "line two"], "notes": ""}
            ]
        });
        normalize_script_value(&mut value);
        assert_eq!(value["sections"][0]["content"], "line one\nline two");
    }

    #[test]
    fn test_normalize_leaves_string_fields_alone() {
        let mut value = serde_json::json!({
            "sections": [{"title": "Intro", "content": "already a string", "notes": "n"}]
        });
        let before = value.clone();
        normalize_script_value(&mut value);
        assert_eq!(value, before);
    }
}
