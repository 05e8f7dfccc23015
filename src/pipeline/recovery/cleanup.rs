//! Cleanup-and-retry support — strips conversational boilerplate that
//! models wrap around their output.
//!
//! The pattern tables are fixed and declarative: tuning which phrases get
//! stripped means editing data, not logic.

use std::sync::LazyLock;

use regex::Regex;

/// Leading phrases up to (and including) a colon or line end.
const LEADING_PATTERNS: &[&str] = &[
    r"(?i)^\s*(sure|certainly|of course|okay|ok)\b[,!.]?\s*",
    r"(?i)^\s*here(\s+is|\s+are|'s)\s+the\s+(extracted\s+)?(data|json|structured\s+output|result|information)[:.]?\s*",
    r"(?i)^\s*the\s+(extracted\s+)?(data|json|result)\s+(is|follows)[:.]?\s*",
    r"(?i)^\s*i\s+(have\s+)?extracted\s+the\s+following[^\n{]*",
    r"(?i)^\s*below\s+is\s+the[^\n{]*",
];

/// Trailing phrases through end of text.
const TRAILING_PATTERNS: &[&str] = &[
    r"(?is)\s*let\s+me\s+know\s+if.*$",
    r"(?is)\s*i?\s*hope\s+this\s+helps.*$",
    r"(?is)\s*feel\s+free\s+to.*$",
    r"(?is)\s*please\s+(verify|review|note).*$",
    r"(?is)\s*is\s+there\s+anything\s+else.*$",
];

static LEADING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    LEADING_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid leading boilerplate regex"))
        .collect()
});

static TRAILING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TRAILING_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid trailing boilerplate regex"))
        .collect()
});

/// Strip known conversational boilerplate from both ends of `text`.
///
/// Leading patterns are applied repeatedly ("Sure! Here is the data:" is
/// two phrases); trailing patterns only fire when the match starts after
/// the last closing brace, so structural content is never cut.
pub fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    loop {
        let before = cleaned.len();
        for re in LEADING.iter() {
            if let Some(m) = re.find(&cleaned) {
                if m.start() == 0 {
                    cleaned = cleaned[m.end()..].trim_start().to_string();
                }
            }
        }
        if cleaned.len() == before {
            break;
        }
    }

    let last_brace = cleaned.rfind('}').map_or(0, |i| i + 1);
    for re in TRAILING.iter() {
        if let Some(m) = re.find(&cleaned) {
            if m.start() >= last_brace {
                cleaned.truncate(m.start());
            }
        }
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_announcement() {
        let text = "Here is the extracted data:\n{\"a\": 1}";
        assert_eq!(strip_boilerplate(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_stacked_leading_phrases() {
        let text = "Sure! Here's the JSON:\n{\"a\": 1}";
        assert_eq!(strip_boilerplate(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_trailing_offer() {
        let text = "{\"a\": 1}\n\nLet me know if you need anything adjusted!";
        assert_eq!(strip_boilerplate(text), "{\"a\": 1}");
    }

    #[test]
    fn trailing_phrase_inside_json_is_preserved() {
        let text = r#"{"warnings": "let me know if symptoms persist"}"#;
        assert_eq!(strip_boilerplate(text), text);
    }

    #[test]
    fn clean_input_passes_through() {
        let text = r#"{"a": 1}"#;
        assert_eq!(strip_boilerplate(text), text);
    }
}
