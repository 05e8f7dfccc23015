//! Balanced-delimiter extraction — finds the first complete JSON object
//! embedded in surrounding prose.
//!
//! The scanner tracks string and escape state explicitly: braces inside
//! quoted strings never count toward nesting depth, and `\"` never toggles
//! string state.

/// Extract the first balanced `{...}` substring from `text`.
///
/// Returns `None` when no opening brace exists or the object never closes
/// (e.g. the response was truncated mid-string).
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Like [`extract_balanced_object`], but falls back to everything from the
/// first opening brace when the object never closes. Used by the repair
/// strategy, which can often close a truncated object itself.
pub fn balanced_object_or_tail(text: &str) -> Option<&str> {
    if let Some(object) = extract_balanced_object(text) {
        return Some(object);
    }
    text.find('{').map(|start| text[start..].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = "Sure! Here you go: {\"a\": 1} Let me know if you need more.";
        assert_eq!(extract_balanced_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let text = r#"{"note": "use {curly} braces", "n": 2}"#;
        assert_eq!(extract_balanced_object(text), Some(text));
    }

    #[test]
    fn escaped_quotes_do_not_toggle_string_state() {
        let text = r#"{"quote": "she said \"hi\"", "n": 1}"#;
        assert_eq!(extract_balanced_object(text), Some(text));
    }

    #[test]
    fn nested_objects_resolve_to_outermost() {
        let text = r#"before {"outer": {"inner": {"deep": true}}} after"#;
        assert_eq!(
            extract_balanced_object(text),
            Some(r#"{"outer": {"inner": {"deep": true}}}"#)
        );
    }

    #[test]
    fn unclosed_object_returns_none() {
        assert_eq!(extract_balanced_object(r#"{"a": "truncated"#), None);
    }

    #[test]
    fn no_brace_returns_none() {
        assert_eq!(extract_balanced_object("no json here"), None);
        assert_eq!(balanced_object_or_tail("no json here"), None);
    }

    #[test]
    fn tail_fallback_returns_truncated_object() {
        let text = r#"prefix {"a": "cut off"#;
        assert_eq!(balanced_object_or_tail(text), Some(r#"{"a": "cut off"#));
    }
}
