//! Hardened parsing of LLM list output.
//!
//! Models asked for a JSON array still wrap it in markdown fences or
//! answer with a bare string often enough that parsing has to tolerate
//! both. A malformed payload degrades to a single-element list holding
//! the cleaned raw text instead of dropping the pipeline result.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("static regex compiles")
});

/// Strip a surrounding markdown code fence, if present.
fn strip_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw,
    }
}

/// Parse an LLM response expected to be a JSON array of strings.
pub fn parse_json_array(raw: &str) -> Vec<String> {
    let cleaned = strip_fence(raw.trim()).trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        // Single-string fallback: a quoted scalar is still usable
        Ok(serde_json::Value::String(s)) if !s.is_empty() => vec![s],
        _ => vec![cleaned.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_array() {
        assert_eq!(
            parse_json_array(r#"["python", "django", "fastapi"]"#),
            vec!["python", "django", "fastapi"]
        );
    }

    #[test]
    fn test_fenced_array() {
        let raw = "```json\n[\"rust\", \"async\"]\n```";
        assert_eq!(parse_json_array(raw), vec!["rust", "async"]);
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```\n[\"a\", \"b\"]\n```";
        assert_eq!(parse_json_array(raw), vec!["a", "b"]);
    }

    #[test]
    fn test_single_string_fallback() {
        assert_eq!(parse_json_array(r#""databases""#), vec!["databases"]);
    }

    #[test]
    fn test_malformed_payload_degrades_to_raw() {
        assert_eq!(parse_json_array("just some words"), vec!["just some words"]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_json_array("   "), Vec::<String>::new());
        assert_eq!(parse_json_array("```\n```"), Vec::<String>::new());
    }

    #[test]
    fn test_non_string_items_are_stringified() {
        assert_eq!(parse_json_array("[1, \"two\"]"), vec!["1", "two"]);
    }
}
