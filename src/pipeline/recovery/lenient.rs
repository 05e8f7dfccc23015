//! Lenient parse — last-resort strategy tolerating the JSON dialect models
//! actually emit: trailing commas, unquoted keys, single-quoted strings,
//! and comments.
//!
//! Implemented as small string-aware normalization passes feeding the
//! strict parser, so each tolerance is independently testable.

use serde_json::Value;

/// Parse `text` with a permissive grammar. Returns `None` when even the
/// normalized form is unparseable.
pub fn lenient_parse(text: &str) -> Option<Value> {
    let without_comments = strip_comments(text.trim());
    let double_quoted = normalize_single_quotes(&without_comments);
    let keys_quoted = quote_bare_keys(&double_quoted);
    let no_trailing = strip_trailing_commas(&keys_quoted);
    serde_json::from_str(&no_trailing).ok()
}

/// Remove `//` line comments and `/* */` block comments outside strings.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}

/// Convert single-quoted strings to double-quoted, re-escaping as needed.
fn normalize_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in text.chars() {
        match quote {
            None => {
                if ch == '\'' {
                    quote = Some('\'');
                    out.push('"');
                } else {
                    if ch == '"' {
                        quote = Some('"');
                    }
                    out.push(ch);
                }
            }
            Some('"') => {
                out.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if escaped {
                    // \' has no meaning in JSON — emit the bare quote.
                    if ch == '\'' {
                        out.push('\'');
                    } else {
                        out.push('\\');
                        out.push(ch);
                    }
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '\'' {
                    quote = None;
                    out.push('"');
                } else if ch == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(ch);
                }
            }
        }
    }

    out
}

/// Wrap bare object keys in double quotes. A bare identifier counts as a
/// key only when it sits at key position (after `{` or a comma in object
/// context) and is followed by a colon.
fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(ch);
                i += 1;
            }
            '{' => {
                stack.push('{');
                expect_key = true;
                out.push(ch);
                i += 1;
            }
            '[' => {
                stack.push('[');
                expect_key = false;
                out.push(ch);
                i += 1;
            }
            '}' | ']' => {
                stack.pop();
                expect_key = false;
                out.push(ch);
                i += 1;
            }
            ',' => {
                expect_key = stack.last() == Some(&'{');
                out.push(ch);
                i += 1;
            }
            c if expect_key && (c.is_alphabetic() || c == '_' || c == '$') => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if chars.get(j) == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                expect_key = false;
            }
            c => {
                if !c.is_whitespace() {
                    expect_key = false;
                }
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Drop commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let structural_next = matches!(
                    chars[i + 1..].iter().find(|c| !c.is_whitespace()),
                    Some('}') | Some(']')
                );
                if !structural_next {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_comma_is_tolerated() {
        let value = lenient_parse(r#"{"a": 1,}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn trailing_comma_in_array_is_tolerated() {
        let value = lenient_parse(r#"{"items": ["a", "b",],}"#).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unquoted_keys_are_tolerated() {
        let value = lenient_parse(r#"{product_name: "Fish Oil", serving_size: "2 softgels"}"#)
            .unwrap();
        assert_eq!(value["product_name"], "Fish Oil");
        assert_eq!(value["serving_size"], "2 softgels");
    }

    #[test]
    fn single_quoted_strings_are_tolerated() {
        let value = lenient_parse(r#"{'name': 'Vitamin C'}"#).unwrap();
        assert_eq!(value["name"], "Vitamin C");
    }

    #[test]
    fn escaped_single_quote_survives() {
        let value = lenient_parse(r#"{'note': 'don\'t exceed 2 daily'}"#).unwrap();
        assert_eq!(value["note"], "don't exceed 2 daily");
    }

    #[test]
    fn double_quote_inside_single_quoted_string_is_escaped() {
        let value = lenient_parse(r#"{'note': 'a "quoted" word'}"#).unwrap();
        assert_eq!(value["note"], "a \"quoted\" word");
    }

    #[test]
    fn line_comments_are_stripped() {
        let text = "{\n  \"a\": 1, // amount per serving\n  \"b\": 2\n}";
        let value = lenient_parse(text).unwrap();
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn block_comments_are_stripped() {
        let value = lenient_parse(r#"{"a": /* inline */ 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let value = lenient_parse(r#"{"url": "https://example.com/a"}"#).unwrap();
        assert_eq!(value["url"], "https://example.com/a");
    }

    #[test]
    fn bare_word_values_are_not_quoted_as_keys() {
        let value = lenient_parse(r#"{"active": true, "tags": [label, other]}"#);
        // bare array values stay invalid — lenient, not magical
        assert!(value.is_none());
    }

    #[test]
    fn combined_dialect_parses() {
        let text = "{\n  name: 'Daily Multi', // product\n  count: 60,\n}";
        let value = lenient_parse(text).unwrap();
        assert_eq!(value["name"], "Daily Multi");
        assert_eq!(value["count"], 60);
    }

    #[test]
    fn garbage_still_fails() {
        assert!(lenient_parse("not even close").is_none());
    }
}
