//! Prompt registry — the single source of prompt text for extraction
//! calls.
//!
//! Keeping prompts in one module means a wording change never hides in a
//! client; the recovery cascade's strategy statistics tell you when these
//! need another pass.

/// System prompt for every label-extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a product-label data extractor. \
Read the supplied label images and output a single JSON object. \
Output valid JSON only, with no surrounding commentary.";

/// User prompt for a full-label extraction.
pub fn full_extraction_prompt(ocr_text: Option<&str>) -> String {
    let mut prompt = String::from(
        "Extract the complete product record from this label as JSON with these fields: \
product_name, brand, net_contents, serving_size, servings_per_container, \
supplement_facts {serving_size, servings_per_container, nutrients: [{name, amount, daily_value}]}, \
ingredients (array of strings), directions, warnings, manufacturer. \
Amounts must keep their units (e.g. \"25 mcg\"). \
Use null for anything not printed on the label — never guess and never use 0 for unknown.",
    );
    if let Some(text) = ocr_text {
        prompt.push_str("\n\nOCR text from the same label, for cross-reference:\n");
        prompt.push_str(text);
    }
    prompt
}

/// User prompt for a supplement-facts-only pass.
pub fn supplement_facts_prompt() -> String {
    "Extract only the supplement-facts panel from this label as JSON: \
{serving_size, servings_per_container, nutrients: [{name, amount, daily_value}]}. \
Preserve the panel's row order. Amounts must keep their units. \
Use null for values not printed on the label."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_prompt_names_every_top_level_field() {
        let prompt = full_extraction_prompt(None);
        for field in [
            "product_name",
            "brand",
            "supplement_facts",
            "ingredients",
            "directions",
            "warnings",
        ] {
            assert!(prompt.contains(field), "prompt is missing {field}");
        }
    }

    #[test]
    fn ocr_text_is_appended_when_present() {
        let prompt = full_extraction_prompt(Some("VITAMIN D 25mcg"));
        assert!(prompt.contains("VITAMIN D 25mcg"));
        assert!(!full_extraction_prompt(None).contains("cross-reference"));
    }
}
