//! Cross-model comparison engine.
//!
//! Pure and stateless: given two extractions of the same label, produce
//! field-by-field discrepancies, a severity-weighted similarity score,
//! and a review recommendation. `a` is the reference side — it drives
//! field enumeration and tolerance baselines.

pub mod amount;
pub mod nutrient;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{NutrientEntry, ProductExtraction, Severity};
use amount::{amounts_match, parse_amount, percents_match};
use nutrient::normalize_nutrient_name;

/// How the two sides disagree on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Present on the reference side only.
    Missing,
    /// Present on both sides with non-matching values.
    Different,
    /// Present on the secondary side only.
    Extra,
}

/// One detected difference between the two extractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub field_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_b: Option<String>,
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    /// How certain the engine is that this is a real disagreement rather
    /// than a matching artifact.
    pub confidence: f64,
    pub description: String,
}

/// Field totals behind the similarity score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldCounts {
    pub total: usize,
    pub matching: usize,
    pub differing: usize,
}

/// Result of comparing two extractions of the same item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub discrepancies: Vec<Discrepancy>,
    /// 0–100, rounded to one decimal place.
    pub similarity_score: f64,
    pub recommends_review: bool,
    pub field_counts: FieldCounts,
}

impl ComparisonResult {
    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    pub fn count_with_severity(&self, severity: Severity) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Similarity weights per severity. Data, not logic: this is the most
/// likely tuning point.
const SEVERITY_WEIGHTS: &[(Severity, f64)] = &[
    (Severity::High, 1.0),
    (Severity::Medium, 0.5),
    (Severity::Low, 0.25),
];

/// Comparable scalar fields outside the panel.
const SCALAR_FIELD_COUNT: usize = 4;

/// Comparable fields per nutrient row: presence, amount, daily value.
const FIELDS_PER_NUTRIENT: usize = 3;

/// Review is recommended below this similarity.
const REVIEW_SIMILARITY_FLOOR: f64 = 85.0;

/// Review is recommended above this many medium discrepancies.
const REVIEW_MEDIUM_CEILING: usize = 2;

fn weight(severity: Severity) -> f64 {
    SEVERITY_WEIGHTS
        .iter()
        .find(|(s, _)| *s == severity)
        .map_or(0.0, |(_, w)| *w)
}

/// Compare two extractions; `a` is the reference side.
pub fn compare(a: &ProductExtraction, b: &ProductExtraction) -> ComparisonResult {
    let mut discrepancies = Vec::new();

    compare_scalar_fields(a, b, &mut discrepancies);
    compare_nutrients(a, b, &mut discrepancies);

    let total_fields = SCALAR_FIELD_COUNT + FIELDS_PER_NUTRIENT * a.nutrient_count();
    let penalty: f64 = discrepancies.iter().map(|d| weight(d.severity)).sum();
    let similarity = if total_fields == 0 {
        100.0
    } else {
        100.0 - (penalty / total_fields as f64) * 100.0
    };
    let similarity = (similarity.clamp(0.0, 100.0) * 10.0).round() / 10.0;

    let medium_count = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::Medium)
        .count();
    let has_high = discrepancies.iter().any(|d| d.severity == Severity::High);
    let recommends_review =
        has_high || medium_count > REVIEW_MEDIUM_CEILING || similarity < REVIEW_SIMILARITY_FLOOR;

    let field_counts = FieldCounts {
        total: total_fields,
        matching: total_fields.saturating_sub(discrepancies.len()),
        differing: discrepancies.len(),
    };

    ComparisonResult {
        discrepancies,
        similarity_score: similarity,
        recommends_review,
        field_counts,
    }
}

fn compare_scalar_fields(
    a: &ProductExtraction,
    b: &ProductExtraction,
    discrepancies: &mut Vec<Discrepancy>,
) {
    let pairs: [(&str, Option<String>, Option<String>); 4] = [
        ("product_name", a.product_name.clone(), b.product_name.clone()),
        ("brand", a.brand.clone(), b.brand.clone()),
        ("serving_size", a.serving_size.clone(), b.serving_size.clone()),
        (
            "ingredients",
            join_ingredients(&a.ingredients),
            join_ingredients(&b.ingredients),
        ),
    ];

    for (field, value_a, value_b) in pairs {
        let norm_a = value_a.as_deref().map(normalize_whitespace);
        let norm_b = value_b.as_deref().map(normalize_whitespace);
        if norm_a == norm_b {
            continue;
        }
        discrepancies.push(Discrepancy {
            field_path: field.to_string(),
            value_a,
            value_b,
            kind: DiscrepancyKind::Different,
            severity: Severity::Low,
            confidence: 0.7,
            description: format!("{field} differs between models"),
        });
    }
}

fn compare_nutrients(
    a: &ProductExtraction,
    b: &ProductExtraction,
    discrepancies: &mut Vec<Discrepancy>,
) {
    let nutrients_a = indexed_nutrients(a);
    let nutrients_b = indexed_nutrients(b);

    for (key, entry_a) in &nutrients_a {
        let path = format!("supplement_facts.nutrients.{key}");
        let Some(entry_b) = nutrients_b.get(key) else {
            discrepancies.push(Discrepancy {
                field_path: path,
                value_a: Some(entry_a.name.clone()),
                value_b: None,
                kind: DiscrepancyKind::Missing,
                severity: Severity::High,
                confidence: 0.9,
                description: format!("nutrient '{}' found by reference model only", entry_a.name),
            });
            continue;
        };

        compare_nutrient_amounts(&path, entry_a, entry_b, discrepancies);
        compare_nutrient_daily_values(&path, entry_a, entry_b, discrepancies);
    }

    for (key, entry_b) in &nutrients_b {
        if nutrients_a.contains_key(key) {
            continue;
        }
        discrepancies.push(Discrepancy {
            field_path: format!("supplement_facts.nutrients.{key}"),
            value_a: None,
            value_b: Some(entry_b.name.clone()),
            kind: DiscrepancyKind::Extra,
            severity: Severity::High,
            confidence: 0.9,
            description: format!("nutrient '{}' found by secondary model only", entry_b.name),
        });
    }
}

fn compare_nutrient_amounts(
    path: &str,
    entry_a: &NutrientEntry,
    entry_b: &NutrientEntry,
    discrepancies: &mut Vec<Discrepancy>,
) {
    let matched = match (entry_a.amount.as_deref(), entry_b.amount.as_deref()) {
        (None, None) => true,
        (Some(amount_a), Some(amount_b)) => amounts_match(amount_a, amount_b),
        _ => false,
    };
    if matched {
        return;
    }

    let unit_mismatch = match (
        entry_a.amount.as_deref().and_then(parse_amount),
        entry_b.amount.as_deref().and_then(parse_amount),
    ) {
        (Some(pa), Some(pb)) => pa.unit != pb.unit,
        _ => false,
    };

    discrepancies.push(Discrepancy {
        field_path: format!("{path}.amount"),
        value_a: entry_a.amount.clone(),
        value_b: entry_b.amount.clone(),
        kind: DiscrepancyKind::Different,
        severity: Severity::High,
        confidence: 0.95,
        description: if unit_mismatch {
            format!("unit mismatch for '{}'", entry_a.name)
        } else {
            format!("amount differs for '{}'", entry_a.name)
        },
    });
}

fn compare_nutrient_daily_values(
    path: &str,
    entry_a: &NutrientEntry,
    entry_b: &NutrientEntry,
    discrepancies: &mut Vec<Discrepancy>,
) {
    if percents_match(entry_a.daily_value.as_deref(), entry_b.daily_value.as_deref()) {
        return;
    }
    discrepancies.push(Discrepancy {
        field_path: format!("{path}.daily_value"),
        value_a: entry_a.daily_value.clone(),
        value_b: entry_b.daily_value.clone(),
        kind: DiscrepancyKind::Different,
        severity: Severity::Medium,
        confidence: 0.95,
        description: format!("daily value differs for '{}'", entry_a.name),
    });
}

/// Index nutrients by normalized name; the first occurrence wins when a
/// panel repeats a name.
fn indexed_nutrients(record: &ProductExtraction) -> BTreeMap<String, &NutrientEntry> {
    let mut map = BTreeMap::new();
    if let Some(facts) = &record.supplement_facts {
        for entry in &facts.nutrients {
            map.entry(normalize_nutrient_name(&entry.name)).or_insert(entry);
        }
    }
    map
}

fn join_ingredients(ingredients: &[String]) -> Option<String> {
    if ingredients.is_empty() {
        None
    } else {
        Some(ingredients.join(", "))
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SupplementFacts;

    fn nutrient(position: usize, name: &str, amount: &str, dv: Option<&str>) -> NutrientEntry {
        NutrientEntry {
            position,
            name: name.to_string(),
            amount: Some(amount.to_string()),
            daily_value: dv.map(String::from),
        }
    }

    fn record(nutrients: Vec<NutrientEntry>) -> ProductExtraction {
        ProductExtraction {
            product_name: Some("Daily Multi".to_string()),
            brand: Some("Acme".to_string()),
            serving_size: Some("1 tablet".to_string()),
            ingredients: vec!["cellulose".to_string(), "stearic acid".to_string()],
            supplement_facts: Some(SupplementFacts {
                serving_size: Some("1 tablet".to_string()),
                servings_per_container: Some("60".to_string()),
                nutrients,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn identical_records_score_100() {
        let a = record(vec![
            nutrient(0, "Vitamin D", "25 mcg", Some("125%")),
            nutrient(1, "Zinc", "11 mg", Some("100%")),
        ]);
        let result = compare(&a, &a.clone());

        assert!(!result.has_discrepancies());
        assert!((result.similarity_score - 100.0).abs() < f64::EPSILON);
        assert!(!result.recommends_review);
        assert_eq!(result.field_counts.total, 4 + 3 * 2);
    }

    #[test]
    fn whitespace_variation_is_not_a_discrepancy() {
        let a = record(vec![]);
        let mut b = record(vec![]);
        b.product_name = Some("Daily   Multi".to_string());
        let result = compare(&a, &b);
        assert!(!result.has_discrepancies());
    }

    #[test]
    fn text_drift_is_low_severity() {
        let a = record(vec![]);
        let mut b = record(vec![]);
        b.brand = Some("Acme Labs".to_string());
        let result = compare(&a, &b);

        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].severity, Severity::Low);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::Different);
    }

    #[test]
    fn fuzzy_name_matching_pairs_vitamin_spellings() {
        let a = record(vec![nutrient(0, "Vitamin B12 (as Methylcobalamin)", "500 mcg", None)]);
        let b = record(vec![nutrient(0, "Vit. B-12", "500 mcg", None)]);
        let result = compare(&a, &b);
        assert!(!result.has_discrepancies());
    }

    #[test]
    fn nutrient_only_in_reference_is_missing_high() {
        let a = record(vec![nutrient(0, "Selenium", "55 mcg", None)]);
        let b = record(vec![]);
        let result = compare(&a, &b);

        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::Missing);
        assert_eq!(result.discrepancies[0].severity, Severity::High);
        assert!(result.recommends_review);
    }

    #[test]
    fn nutrient_only_in_secondary_is_extra_high() {
        let a = record(vec![]);
        let b = record(vec![nutrient(0, "Biotin", "30 mcg", None)]);
        let result = compare(&a, &b);

        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::Extra);
        assert_eq!(result.discrepancies[0].severity, Severity::High);
    }

    #[test]
    fn microgram_synonyms_agree_but_mg_does_not() {
        let a = record(vec![nutrient(0, "Folate", "100 mcg", None)]);
        let b_synonym = record(vec![nutrient(0, "Folate", "100 µg", None)]);
        assert!(!compare(&a, &b_synonym).has_discrepancies());

        let b_mg = record(vec![nutrient(0, "Folate", "0.1 mg", None)]);
        let result = compare(&a, &b_mg);
        assert_eq!(result.discrepancies.len(), 1);
        assert!(result.discrepancies[0].description.contains("unit mismatch"));
        assert_eq!(result.discrepancies[0].severity, Severity::High);
    }

    #[test]
    fn daily_value_within_one_point_matches() {
        let a = record(vec![nutrient(0, "Vitamin C", "90 mg", Some("100%"))]);
        let b_close = record(vec![nutrient(0, "Vitamin C", "90 mg", Some("101%"))]);
        assert!(!compare(&a, &b_close).has_discrepancies());

        let b_far = record(vec![nutrient(0, "Vitamin C", "90 mg", Some("103%"))]);
        let result = compare(&a, &b_far);
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].severity, Severity::Medium);
    }

    #[test]
    fn similarity_formula_weights_severities() {
        // 1 nutrient → 4 + 3 = 7 fields. One high (missing nutrient)
        // → 100 − 1.0/7×100 = 85.7
        let a = record(vec![nutrient(0, "Iron", "18 mg", None)]);
        let b = record(vec![]);
        let result = compare(&a, &b);
        assert!((result.similarity_score - 85.7).abs() < 0.01);
        assert!(result.recommends_review, "high severity always recommends review");
    }

    #[test]
    fn review_threshold_triggers_below_85() {
        // Reference has 2 nutrients → 10 fields. Two high amount
        // mismatches → 100 − 2/10×100 = 80 < 85.
        let a = record(vec![
            nutrient(0, "Iron", "18 mg", None),
            nutrient(1, "Zinc", "11 mg", None),
        ]);
        let b = record(vec![
            nutrient(0, "Iron", "25 mg", None),
            nutrient(1, "Zinc", "15 mg", None),
        ]);
        let result = compare(&a, &b);
        assert!(result.similarity_score < REVIEW_SIMILARITY_FLOOR);
        assert!(result.recommends_review);
    }

    #[test]
    fn unparseable_amount_fails_comparison() {
        let a = record(vec![nutrient(0, "Proprietary Blend", "a dash", None)]);
        let b = record(vec![nutrient(0, "Proprietary Blend", "a dash", None)]);
        let result = compare(&a, &b);
        // identical strings, but neither parses — treated as non-matching
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::Different);
    }
}
