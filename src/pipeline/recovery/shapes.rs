//! Shape validators — cheap structural predicates that gate which recovery
//! candidates are accepted.
//!
//! A validator never inspects field *values*; it only confirms the parsed
//! object plausibly belongs to the expected structural family before the
//! expensive schema validation runs.

use serde_json::Value;

/// Declarative shape check: all `required` keys must be present, and at
/// least one `any_of` key must be present and non-null (when the list is
/// non-empty).
#[derive(Debug, Clone, Copy)]
pub struct ShapeValidator {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub any_of: &'static [&'static str],
}

impl ShapeValidator {
    /// True when `value` plausibly matches this shape.
    pub fn matches(&self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };

        if !self.required.iter().all(|key| obj.contains_key(*key)) {
            return false;
        }

        self.any_of.is_empty()
            || self
                .any_of
                .iter()
                .any(|key| obj.get(*key).is_some_and(|v| !v.is_null()))
    }
}

/// A complete label extraction: at least one of the core sections present.
pub const FULL_EXTRACTION: ShapeValidator = ShapeValidator {
    name: "full_extraction",
    required: &[],
    any_of: &["product_name", "supplement_facts", "ingredients"],
};

/// Just the supplement-facts panel.
pub const SUPPLEMENT_FACTS_ONLY: ShapeValidator = ShapeValidator {
    name: "supplement_facts_only",
    required: &["nutrients"],
    any_of: &[],
};

/// Output of the text-structuring prompt (labeled sections over raw text).
pub const TEXT_STRUCTURING: ShapeValidator = ShapeValidator {
    name: "text_structuring",
    required: &["sections"],
    any_of: &[],
};

/// Metadata-only extraction (front-of-pack, no panel).
pub const METADATA_ONLY: ShapeValidator = ShapeValidator {
    name: "metadata_only",
    required: &["product_name"],
    any_of: &["brand", "net_contents", "manufacturer"],
};
