use serde::{Deserialize, Serialize};

/// Validated record extracted from one scanned product label.
///
/// Numeric amounts are kept as display strings ("100 mcg", "<1 g") so the
/// unit is never separated from the value. A populated amount always
/// carries a unit; "unknown"-style sentinels are mapped to `None` during
/// normalization, never stored as bare zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductExtraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings_per_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplement_facts: Option<SupplementFacts>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

/// The supplement-facts panel: an ordered list of nutrient rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplementFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings_per_container: Option<String>,
    #[serde(default)]
    pub nutrients: Vec<NutrientEntry>,
}

/// One row of the supplement-facts panel.
///
/// `position` preserves source order — panels list nutrients in a fixed
/// regulatory sequence, and reordering them loses information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutrientEntry {
    pub position: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_value: Option<String>,
}

impl ProductExtraction {
    /// Count of nutrient rows, zero when no panel was found.
    pub fn nutrient_count(&self) -> usize {
        self.supplement_facts
            .as_ref()
            .map_or(0, |facts| facts.nutrients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nutrient_count_without_panel_is_zero() {
        let record = ProductExtraction::default();
        assert_eq!(record.nutrient_count(), 0);
    }

    #[test]
    fn serde_round_trip_preserves_positions() {
        let record = ProductExtraction {
            product_name: Some("Daily Multi".to_string()),
            supplement_facts: Some(SupplementFacts {
                serving_size: Some("1 tablet".to_string()),
                servings_per_container: Some("60".to_string()),
                nutrients: vec![
                    NutrientEntry {
                        position: 0,
                        name: "Vitamin D".to_string(),
                        amount: Some("25 mcg".to_string()),
                        daily_value: Some("125%".to_string()),
                    },
                    NutrientEntry {
                        position: 1,
                        name: "Zinc".to_string(),
                        amount: Some("11 mg".to_string()),
                        daily_value: Some("100%".to_string()),
                    },
                ],
            }),
            ..Default::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: ProductExtraction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nutrient_count(), 2);
        assert_eq!(back.supplement_facts.unwrap().nutrients[1].position, 1);
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let record: ProductExtraction =
            serde_json::from_str(r#"{"product_name": "Bare"}"#).unwrap();
        assert!(record.ingredients.is_empty());
        assert!(record.supplement_facts.is_none());
    }
}
