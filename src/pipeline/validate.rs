//! Strict schema validation and normalization.
//!
//! Validation walks the recovered JSON by hand so every problem is
//! reported with its field path — serde would stop at the first. The
//! normalizer enforces the core invariant: a populated amount carries a
//! unit or is absent; sentinel values never masquerade as data.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::compare::amount::parse_amount;
use crate::models::{NutrientEntry, ProductExtraction, SupplementFacts};

/// Upper bound on free-text fields (directions, warnings).
pub const MAX_FREE_TEXT_LEN: usize = 4_000;

/// Values that mean "the model did not know" and must become absent.
const ABSENT_SENTINELS: &[&str] = &["0", "unknown", "n/a", "na", "none", "null", "-"];

/// Strict validation failed; `errors` carry `path: message` entries.
#[derive(Debug, Clone, Error)]
#[error("strict validation failed: {}", errors.join("; "))]
pub struct StrictValidationFailure {
    pub errors: Vec<String>,
}

/// Validate a recovered value into a normalized [`ProductExtraction`].
///
/// All problems are collected before failing, so the salvage path can
/// turn every one of them into a scoped warning.
pub fn validate_extraction(value: &Value) -> Result<ProductExtraction, StrictValidationFailure> {
    let Some(obj) = value.as_object() else {
        return Err(StrictValidationFailure {
            errors: vec!["record: expected a JSON object".to_string()],
        });
    };

    let mut errors = Vec::new();
    let record = build_record(obj, &mut errors);

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(StrictValidationFailure { errors })
    }
}

fn build_record(obj: &Map<String, Value>, errors: &mut Vec<String>) -> ProductExtraction {
    ProductExtraction {
        product_name: text_field(obj, "product_name", errors),
        brand: text_field(obj, "brand", errors),
        net_contents: text_field(obj, "net_contents", errors),
        serving_size: text_field(obj, "serving_size", errors),
        servings_per_container: text_field(obj, "servings_per_container", errors),
        supplement_facts: facts_field(obj, errors),
        ingredients: ingredients_field(obj, errors),
        directions: bounded_text_field(obj, "directions", errors),
        warnings: bounded_text_field(obj, "warnings", errors),
        manufacturer: text_field(obj, "manufacturer", errors),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str, errors: &mut Vec<String>) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => normalize_text(s),
        Some(other) => {
            errors.push(format!("{key}: expected string, got {}", json_type(other)));
            None
        }
    }
}

fn bounded_text_field(
    obj: &Map<String, Value>,
    key: &str,
    errors: &mut Vec<String>,
) -> Option<String> {
    text_field(obj, key, errors).map(|text| bound_text(&text, MAX_FREE_TEXT_LEN))
}

fn ingredients_field(obj: &Map<String, Value>, errors: &mut Vec<String>) -> Vec<String> {
    match obj.get("ingredients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut ingredients = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => {
                        if let Some(text) = normalize_text(s) {
                            ingredients.push(text);
                        }
                    }
                    other => errors.push(format!(
                        "ingredients[{i}]: expected string, got {}",
                        json_type(other)
                    )),
                }
            }
            ingredients
        }
        Some(other) => {
            errors.push(format!(
                "ingredients: expected array of strings, got {}",
                json_type(other)
            ));
            Vec::new()
        }
    }
}

fn facts_field(obj: &Map<String, Value>, errors: &mut Vec<String>) -> Option<SupplementFacts> {
    match obj.get("supplement_facts") {
        None | Some(Value::Null) => None,
        Some(Value::Object(facts)) => Some(build_facts(facts, errors)),
        Some(other) => {
            errors.push(format!(
                "supplement_facts: expected object, got {}",
                json_type(other)
            ));
            None
        }
    }
}

fn build_facts(facts: &Map<String, Value>, errors: &mut Vec<String>) -> SupplementFacts {
    let serving_size = match facts.get("serving_size") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => normalize_text(s),
        Some(other) => {
            errors.push(format!(
                "supplement_facts.serving_size: expected string, got {}",
                json_type(other)
            ));
            None
        }
    };
    let servings_per_container = match facts.get("servings_per_container") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => normalize_text(s),
        Some(other) => {
            errors.push(format!(
                "supplement_facts.servings_per_container: expected string, got {}",
                json_type(other)
            ));
            None
        }
    };

    let nutrients = match facts.get("nutrients") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| build_nutrient(i, item, errors))
            .collect(),
        None | Some(Value::Null) => {
            errors.push("supplement_facts.nutrients: missing".to_string());
            Vec::new()
        }
        Some(other) => {
            errors.push(format!(
                "supplement_facts.nutrients: expected array, got {}",
                json_type(other)
            ));
            Vec::new()
        }
    };

    SupplementFacts {
        serving_size,
        servings_per_container,
        nutrients,
    }
}

fn build_nutrient(index: usize, value: &Value, errors: &mut Vec<String>) -> Option<NutrientEntry> {
    let path = format!("supplement_facts.nutrients[{index}]");
    let Some(obj) = value.as_object() else {
        errors.push(format!("{path}: expected object, got {}", json_type(value)));
        return None;
    };

    let name = match obj.get("name").and_then(Value::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => collapse_whitespace(name),
        _ => {
            errors.push(format!("{path}.name: missing or empty"));
            return None;
        }
    };

    let amount = match obj.get("amount") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match normalize_text(s) {
            None => None,
            Some(text) => {
                if parse_amount(&text).is_none() {
                    errors.push(format!("{path}.amount: invalid amount {text:?}"));
                }
                Some(text)
            }
        },
        Some(other) => {
            // A bare number is exactly the "zero standing in for unknown"
            // failure mode — the unit must travel with the value.
            errors.push(format!(
                "{path}.amount: bare {} without unit",
                json_type(other)
            ));
            None
        }
    };

    let daily_value = match obj.get("daily_value") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match normalize_text(s) {
            None => None,
            Some(text) => {
                if !text.chars().any(|c| c.is_ascii_digit()) {
                    errors.push(format!("{path}.daily_value: not a percentage: {text:?}"));
                }
                Some(text)
            }
        },
        Some(other) => {
            errors.push(format!(
                "{path}.daily_value: expected string, got {}",
                json_type(other)
            ));
            None
        }
    };

    let position = match obj.get("position") {
        Some(value) if value.is_u64() => value.as_u64().unwrap_or(index as u64) as usize,
        _ => index,
    };

    Some(NutrientEntry {
        position,
        name,
        amount,
        daily_value,
    })
}

/// Collapse whitespace and map sentinel values to absent.
pub fn normalize_text(text: &str) -> Option<String> {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return None;
    }
    let lower = collapsed.to_lowercase();
    if ABSENT_SENTINELS.contains(&lower.as_str()) {
        return None;
    }
    Some(collapsed)
}

/// Truncate at a char boundary; long free text is bounded, not rejected.
pub fn bound_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    text.chars().take(max_len).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_record_validates_and_normalizes() {
        let value = json!({
            "product_name": "  Daily   Multi ",
            "brand": "Acme",
            "supplement_facts": {
                "serving_size": "1 tablet",
                "nutrients": [
                    {"name": "Vitamin D", "amount": "25 mcg", "daily_value": "125%"},
                    {"name": "Zinc", "amount": "11 mg", "daily_value": "100%"}
                ]
            },
            "ingredients": ["cellulose", "stearic acid"]
        });

        let record = validate_extraction(&value).unwrap();
        assert_eq!(record.product_name.as_deref(), Some("Daily Multi"));
        assert_eq!(record.nutrient_count(), 2);
        let facts = record.supplement_facts.unwrap();
        assert_eq!(facts.nutrients[0].position, 0);
        assert_eq!(facts.nutrients[1].position, 1);
    }

    #[test]
    fn sentinel_values_become_absent() {
        let value = json!({
            "product_name": "Multi",
            "brand": "unknown",
            "net_contents": "N/A",
            "serving_size": "-",
            "ingredients": []
        });
        let record = validate_extraction(&value).unwrap();
        assert!(record.brand.is_none());
        assert!(record.net_contents.is_none());
        assert!(record.serving_size.is_none());
    }

    #[test]
    fn bare_numeric_amount_is_an_error() {
        let value = json!({
            "product_name": "Multi",
            "supplement_facts": {
                "nutrients": [{"name": "Iron", "amount": 18}]
            }
        });
        let err = validate_extraction(&value).unwrap_err();
        assert!(err
            .errors
            .iter()
            .any(|e| e.contains("nutrients[0].amount") && e.contains("without unit")));
    }

    #[test]
    fn unparseable_amount_is_an_error_but_kept() {
        let value = json!({
            "product_name": "Multi",
            "supplement_facts": {
                "nutrients": [{"name": "Blend", "amount": "two scoops worth"}]
            }
        });
        let err = validate_extraction(&value).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("invalid amount")));
    }

    #[test]
    fn nameless_nutrient_is_an_error() {
        let value = json!({
            "product_name": "Multi",
            "supplement_facts": {"nutrients": [{"amount": "5 mg"}]}
        });
        let err = validate_extraction(&value).unwrap_err();
        assert!(err.errors.iter().any(|e| e.contains("name: missing")));
    }

    #[test]
    fn errors_accumulate_across_fields() {
        let value = json!({
            "product_name": 42,
            "ingredients": "not an array",
            "supplement_facts": {
                "nutrients": [{"name": "Iron", "amount": 18}]
            }
        });
        let err = validate_extraction(&value).unwrap_err();
        assert!(err.errors.len() >= 3);
    }

    #[test]
    fn long_free_text_is_bounded() {
        let value = json!({
            "product_name": "Multi",
            "directions": "x".repeat(MAX_FREE_TEXT_LEN + 500)
        });
        let record = validate_extraction(&value).unwrap();
        assert_eq!(record.directions.unwrap().chars().count(), MAX_FREE_TEXT_LEN);
    }

    #[test]
    fn explicit_positions_are_respected() {
        let value = json!({
            "product_name": "Multi",
            "supplement_facts": {
                "nutrients": [{"name": "Zinc", "position": 7}]
            }
        });
        let record = validate_extraction(&value).unwrap();
        assert_eq!(record.supplement_facts.unwrap().nutrients[0].position, 7);
    }

    #[test]
    fn non_object_root_fails() {
        assert!(validate_extraction(&json!([1, 2])).is_err());
    }
}
