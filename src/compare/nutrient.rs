//! Nutrient-name normalization — the fuzzy-matching step that pairs rows
//! across two independently extracted panels.
//!
//! "Vitamin B12 (as Methylcobalamin)" and "vit b-12" must land on the
//! same key; "Zinc" and "Zinc Oxide" must not be forced together by
//! anything cleverer than these fixed rules.

use std::sync::LazyLock;

use regex::Regex;

static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthetical regex"));

/// Normalize a nutrient name for cross-panel matching: lowercase, drop
/// parenthetical content, collapse the "vitamin" token to "vit", then
/// strip every non-alphanumeric character.
pub fn normalize_nutrient_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let without_parens = PARENTHETICAL_RE.replace_all(&lower, "");
    let collapsed = without_parens.replace("vitamin", "vit");
    collapsed.chars().filter(|c| c.is_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_spacing() {
        assert_eq!(normalize_nutrient_name("Folic Acid"), "folicacid");
    }

    #[test]
    fn parenthetical_source_forms_are_dropped() {
        assert_eq!(
            normalize_nutrient_name("Vitamin B12 (as Methylcobalamin)"),
            "vitb12"
        );
    }

    #[test]
    fn vitamin_token_collapses_to_vit() {
        assert_eq!(normalize_nutrient_name("Vitamin D3"), "vitd3");
        assert_eq!(normalize_nutrient_name("vit d3"), "vitd3");
    }

    #[test]
    fn punctuation_variants_converge() {
        assert_eq!(
            normalize_nutrient_name("Vit. B-12"),
            normalize_nutrient_name("Vitamin B12")
        );
    }

    #[test]
    fn distinct_nutrients_stay_distinct() {
        assert_ne!(
            normalize_nutrient_name("Zinc"),
            normalize_nutrient_name("Zinc Oxide")
        );
    }
}
