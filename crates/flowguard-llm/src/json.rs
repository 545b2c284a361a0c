//! Recovering a JSON object from free-form model text.
//!
//! Backends without native schema enforcement return prose that usually
//! contains the object, sometimes wrapped in a Markdown code fence.

use crate::{LlmError, Result};

/// Extract the first JSON object embedded in `text`.
///
/// Tries, in order: the whole trimmed text, the contents of a fenced code
/// block, and the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(v);
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(inner.trim()) {
            return Ok(v);
        }
    }

    let span = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };
    serde_json::from_str(span).map_err(|source| LlmError::Parse {
        output: trimmed.to_owned(),
        source,
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an info string such as `json`.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn fenced_object() {
        let text = "Here you go:\n```json\n{\"severity\": \"Low\"}\n```\nDone.";
        let v = extract_json(text).unwrap();
        assert_eq!(v["severity"], "Low");
    }

    #[test]
    fn object_inside_prose() {
        let text = "The answer is {\"ok\": true} as requested.";
        let v = extract_json(text).unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn no_object_is_parse_error() {
        let err = extract_json("nothing here").unwrap_err();
        assert!(matches!(err, LlmError::Parse { .. }));
    }
}
