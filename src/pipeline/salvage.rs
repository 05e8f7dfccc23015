//! Salvage parse — best-effort reconstruction when strict validation
//! fails.
//!
//! The rule is per-field, never all-or-nothing: whatever supplement-facts
//! substructure exists in the raw value is preserved field-by-field, with
//! permissive defaults standing in for required-but-missing scalars.
//! Strict validation errors become scoped [`ValidationWarning`]s via a
//! fixed severity table.

use serde_json::Value;

use crate::models::{
    NutrientEntry, ProductExtraction, Severity, SupplementFacts, ValidationWarning,
};
use crate::pipeline::validate::{bound_text, normalize_text, MAX_FREE_TEXT_LEN};

/// A salvaged record plus the warnings explaining what strict validation
/// objected to.
#[derive(Debug, Clone)]
pub struct SalvageResult {
    pub record: ProductExtraction,
    pub warnings: Vec<ValidationWarning>,
}

/// Rebuild a best-effort record from a raw value that failed strict
/// validation. Returns `None` when nothing usable survives — that is the
/// hard-failure case.
pub fn salvage_extraction(value: &Value, errors: &[String]) -> Option<SalvageResult> {
    let obj = value.as_object()?;

    let record = ProductExtraction {
        product_name: lenient_text(obj.get("product_name")),
        brand: lenient_text(obj.get("brand")),
        net_contents: lenient_text(obj.get("net_contents")),
        serving_size: lenient_text(obj.get("serving_size")),
        servings_per_container: lenient_text(obj.get("servings_per_container")),
        supplement_facts: obj.get("supplement_facts").and_then(salvage_facts),
        ingredients: lenient_ingredients(obj.get("ingredients")),
        directions: lenient_text(obj.get("directions"))
            .map(|text| bound_text(&text, MAX_FREE_TEXT_LEN)),
        warnings: lenient_text(obj.get("warnings"))
            .map(|text| bound_text(&text, MAX_FREE_TEXT_LEN)),
        manufacturer: lenient_text(obj.get("manufacturer")),
    };

    if !is_usable(&record) {
        return None;
    }

    let warnings = errors.iter().map(|e| warning_from_error(e)).collect();
    Some(SalvageResult { record, warnings })
}

/// A salvaged record must carry at least one piece of real content.
fn is_usable(record: &ProductExtraction) -> bool {
    record.product_name.is_some()
        || record.brand.is_some()
        || record.nutrient_count() > 0
        || !record.ingredients.is_empty()
}

/// Coerce any scalar into normalized text; sentinels still become absent.
fn lenient_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => normalize_text(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept an array of strings, or a comma-separated string.
fn lenient_ingredients(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| lenient_text(Some(item)))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .filter_map(|part| normalize_text(part))
            .collect(),
        _ => Vec::new(),
    }
}

fn salvage_facts(value: &Value) -> Option<SupplementFacts> {
    let obj = value.as_object()?;

    let nutrients = match obj.get("nutrients") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| salvage_nutrient(i, item))
            .collect(),
        _ => Vec::new(),
    };

    Some(SupplementFacts {
        serving_size: lenient_text(obj.get("serving_size")),
        servings_per_container: lenient_text(obj.get("servings_per_container")),
        nutrients,
    })
}

/// Preserve a nutrient row field-by-field. A missing name falls back to
/// an empty string; amounts that carry no unit fall back to absent, so
/// the unit invariant holds even on the salvage path.
fn salvage_nutrient(index: usize, value: &Value) -> Option<NutrientEntry> {
    let obj = value.as_object()?;

    let name = obj
        .get("name")
        .and_then(|v| lenient_text(Some(v)))
        .unwrap_or_default();

    let amount = lenient_text(obj.get("amount"))
        .filter(|text| crate::compare::amount::parse_amount(text).is_some());

    let daily_value = match obj.get("daily_value") {
        Some(Value::Number(n)) => Some(format!("{n}%")),
        other => other.and_then(|v| lenient_text(Some(v))),
    };

    let position = obj
        .get("position")
        .and_then(Value::as_u64)
        .map_or(index, |p| p as usize);

    Some(NutrientEntry {
        position,
        name,
        amount,
        daily_value,
    })
}

/// Severity table for validation warnings (fixed rule):
/// nutrient-amount paths and "invalid amount" messages are high, daily
/// value and serving paths are medium, everything else is low.
fn severity_for(field_path: &str, message: &str) -> Severity {
    let amount_path = field_path.contains("nutrients[") && field_path.contains(".amount");
    if amount_path || message.contains("invalid amount") {
        return Severity::High;
    }
    if field_path.contains("daily_value") || field_path.contains("serving") {
        return Severity::Medium;
    }
    Severity::Low
}

/// Parse a `path: message` strict-validation error into a structured
/// warning.
fn warning_from_error(error: &str) -> ValidationWarning {
    let (field_path, message) = error.split_once(": ").unwrap_or(("record", error));
    ValidationWarning::new(field_path, message, severity_for(field_path, message))
}
