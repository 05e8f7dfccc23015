//! Amount and percentage parsing for nutrient comparison.
//!
//! Amounts arrive as display strings ("100 mcg", "<1 g", "2,5 mg"). The
//! parser splits them into value + unit; unit synonyms collapse into
//! classes before comparison so "100 mcg" and "100 µg" agree while
//! "0.1 mg" does not.

use std::sync::LazyLock;

use regex::Regex;

/// Optional "<" prefix, a number (dot or comma decimal), then a unit token.
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(<)?\s*([0-9]+(?:[.,][0-9]+)?)\s*([A-Za-zμµ%]+)\s*$").expect("valid amount regex")
});

/// A parsed nutrient amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAmount {
    /// True for "less than" amounts like "<1 g".
    pub less_than: bool,
    pub value: f64,
    /// Normalized unit class (lowercased, synonyms collapsed).
    pub unit: String,
}

/// Parse an amount string. Returns `None` when the text does not follow
/// the number-then-unit form — callers treat that as a failed comparison,
/// never as zero.
pub fn parse_amount(text: &str) -> Option<ParsedAmount> {
    let captures = AMOUNT_RE.captures(text)?;
    let value: f64 = captures
        .get(2)?
        .as_str()
        .replace(',', ".")
        .parse()
        .ok()?;
    let unit = normalize_unit(captures.get(3)?.as_str());
    Some(ParsedAmount {
        less_than: captures.get(1).is_some(),
        value,
        unit,
    })
}

/// Collapse known unit synonym classes. Only the microgram spellings are
/// equated; other units pass through lowercased. IU-to-mass conversions
/// are nutrient-specific and deliberately not attempted.
fn normalize_unit(unit: &str) -> String {
    let lower = unit.to_lowercase();
    match lower.as_str() {
        "mcg" | "μg" | "µg" => "mcg".to_string(),
        _ => lower,
    }
}

/// Relative tolerance on amount values, against the reference side.
const AMOUNT_TOLERANCE: f64 = 0.01;

/// Compare two amount strings. Unit-class mismatch always fails; values
/// match within 1% relative tolerance of the reference (`a`) value.
pub fn amounts_match(a: &str, b: &str) -> bool {
    let (Some(parsed_a), Some(parsed_b)) = (parse_amount(a), parse_amount(b)) else {
        return false;
    };
    if parsed_a.unit != parsed_b.unit {
        return false;
    }
    let tolerance = parsed_a.value.abs() * AMOUNT_TOLERANCE;
    (parsed_a.value - parsed_b.value).abs() <= tolerance
}

/// Absolute tolerance on daily-value percentage points.
const PERCENT_TOLERANCE: f64 = 1.0;

/// Compare two daily-value strings after stripping non-numeric characters.
/// Absent-on-both-sides matches; absent-on-one-side does not.
pub fn percents_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.and_then(parse_percent), b.and_then(parse_percent)) {
        (None, None) => a.is_none() && b.is_none(),
        (Some(pa), Some(pb)) => (pa - pb).abs() <= PERCENT_TOLERANCE,
        _ => false,
    }
}

fn parse_percent(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_amount() {
        let parsed = parse_amount("100 mcg").unwrap();
        assert!(!parsed.less_than);
        assert!((parsed.value - 100.0).abs() < f64::EPSILON);
        assert_eq!(parsed.unit, "mcg");
    }

    #[test]
    fn parses_less_than_amount() {
        let parsed = parse_amount("<1 g").unwrap();
        assert!(parsed.less_than);
        assert_eq!(parsed.unit, "g");
    }

    #[test]
    fn parses_comma_decimal() {
        let parsed = parse_amount("2,5 mg").unwrap();
        assert!((parsed.value - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unitless_and_garbage() {
        assert!(parse_amount("100").is_none());
        assert!(parse_amount("plenty").is_none());
        assert!(parse_amount("").is_none());
    }

    #[test]
    fn microgram_spellings_are_one_class() {
        assert!(amounts_match("100 mcg", "100 µg"));
        assert!(amounts_match("100 mcg", "100 μg"));
    }

    #[test]
    fn milligrams_and_micrograms_are_distinct() {
        // "100 mcg" vs "0.1 mg" is numerically identical, but unit
        // classes differ, so it must report a mismatch.
        assert!(!amounts_match("100 mcg", "0.1 mg"));
    }

    #[test]
    fn values_match_within_one_percent() {
        assert!(amounts_match("100 mg", "100.9 mg"));
        assert!(!amounts_match("100 mg", "102 mg"));
    }

    #[test]
    fn unparseable_side_fails_comparison() {
        assert!(!amounts_match("100 mg", "a pinch"));
        assert!(!amounts_match("a pinch", "100 mg"));
    }

    #[test]
    fn percent_tolerance_is_one_point() {
        assert!(percents_match(Some("100%"), Some("101%")));
        assert!(!percents_match(Some("100%"), Some("103%")));
    }

    #[test]
    fn percent_absence_rules() {
        assert!(percents_match(None, None));
        assert!(!percents_match(Some("50%"), None));
        assert!(!percents_match(None, Some("50%")));
    }

    #[test]
    fn percent_strips_decorations() {
        assert!(percents_match(Some("†100 %"), Some("100")));
    }
}
