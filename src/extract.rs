//! Structured-response extraction.
//!
//! Model output is free text: prose, markdown, and (hopefully) one fenced
//! JSON block. This module pulls the JSON out in two stages:
//! 1. a ```json fenced block, matched non-greedily so the first block wins
//!    even when the surrounding prose contains brace characters
//! 2. fallback only when no fence is present: the substring between the
//!    first `{` and the last `}` of the whole response
//!
//! Key validation is a separate step so a parse success with missing keys
//! is distinguishable from a parse failure.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::errors::ExtractionError;

static FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)```json\s*(.*?)```").unwrap());

/// Extract and parse the JSON payload from a raw model response.
pub fn extract_json(raw: &str) -> Result<Value, ExtractionError> {
    let candidate = match find_candidate(raw) {
        Some(text) => text,
        None => return Err(ExtractionError::NoStructureFound),
    };

    serde_json::from_str(&candidate).map_err(|source| ExtractionError::MalformedJson {
        candidate,
        source,
    })
}

/// Locate the candidate JSON text: fenced block first, brace span second.
fn find_candidate(raw: &str) -> Option<String> {
    if let Some(caps) = FENCE_REGEX.captures(raw) {
        return Some(caps[1].trim().to_string());
    }

    // The brace span is less reliable: prose before/after the JSON often
    // contains stray braces, which is why the fence is always preferred.
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

/// Validate that a parsed response object carries every required top-level
/// key, failing with the first missing key by name.
pub fn require_keys(value: &Value, keys: &[&str]) -> Result<(), ExtractionError> {
    for key in keys {
        if value.get(key).is_none() {
            return Err(ExtractionError::SchemaMismatch {
                key: (*key).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json_with_surrounding_prose() {
        let raw = r#"Sure! Here is the project you asked for:

```json
{"project_name": "demo", "files": {"main.py": "print(1)"}}
```

Let me know if you need anything else."#;

        let value = extract_json(raw).unwrap();
        assert_eq!(value["project_name"], "demo");
        assert_eq!(value["files"]["main.py"], "print(1)");
    }

    #[test]
    fn fence_wins_over_stray_braces_in_prose() {
        // The prose contains an unmatched '{' before the fence; a naive
        // first-brace scan would grab it.
        let raw = r#"Note: use {placeholders where needed.

```json
{"key": "value"}
```"#;

        let value = extract_json(raw).unwrap();
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn first_fenced_block_is_selected() {
        let raw = "```json\n{\"first\": 1}\n```\nand also\n```json\n{\"second\": 2}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["first"], 1);
        assert!(value.get("second").is_none());
    }

    #[test]
    fn falls_back_to_brace_span_without_fence() {
        let raw = r#"Here you go: {"key": "value"} — enjoy!"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn brace_fallback_spans_first_to_last_brace() {
        let raw = r#"{"outer": {"inner": "value"}}"#;
        let value = extract_json(raw).unwrap();
        assert_eq!(value["outer"]["inner"], "value");
    }

    #[test]
    fn no_structure_at_all_is_reported() {
        let err = extract_json("I could not produce a project, sorry.").unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructureFound));
    }

    #[test]
    fn malformed_json_carries_the_candidate_text() {
        let raw = "```json\n{\"unterminated\": \n```";
        let err = extract_json(raw).unwrap_err();
        match err {
            ExtractionError::MalformedJson { candidate, .. } => {
                assert!(candidate.contains("unterminated"));
            }
            other => panic!("Expected MalformedJson, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_brace_fallback_is_malformed_not_missing() {
        // A '{' with no matching '}' anywhere: rfind('}') fails, so this is
        // structurally absent, not malformed.
        let err = extract_json("set {foo to bar").unwrap_err();
        assert!(matches!(err, ExtractionError::NoStructureFound));
    }

    #[test]
    fn require_keys_passes_when_all_present() {
        let value: Value =
            serde_json::from_str(r#"{"files": {}, "project_name": "x"}"#).unwrap();
        assert!(require_keys(&value, &["project_name", "files"]).is_ok());
    }

    #[test]
    fn require_keys_names_the_missing_key() {
        let value: Value = serde_json::from_str(r#"{"files": {}}"#).unwrap();
        let err = require_keys(&value, &["files", "project_name"]).unwrap_err();
        match err {
            ExtractionError::SchemaMismatch { key } => assert_eq!(key, "project_name"),
            other => panic!("Expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn fence_tag_is_case_insensitive() {
        let raw = "```JSON\n{\"k\": 1}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["k"], 1);
    }
}
