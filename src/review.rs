//! Review queue — types and priority scoring.
//!
//! Items whose extractions disagree or carry validation warnings are
//! queued for human review, ordered by a weighted priority. Validation
//! severity outweighs comparison severity: a validation warning is a
//! persistent, reproducible data-quality defect, while a comparison
//! discrepancy is only a cross-model disagreement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::ComparisonResult;
use crate::models::{Severity, ValidationWarning};

/// Lifecycle of a review entry. `Resolved` and `Dismissed` are terminal:
/// re-processing an item never moves it out of them unless the caller
/// explicitly re-triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InProgress,
    Resolved,
    Dismissed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }

    /// True for statuses a re-run must not silently reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One queued item, keyed by item id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub item_id: String,
    pub total_discrepancies: u32,
    pub high_count: u32,
    pub medium_count: u32,
    pub priority: u32,
    pub status: ReviewStatus,
    pub updated_at: DateTime<Utc>,
}

/// Priority weights. Data, not logic: the tuning point.
const VALIDATION_HIGH_WEIGHT: u32 = 3;
const COMPARISON_HIGH_WEIGHT: u32 = 2;
const MEDIUM_WEIGHT: u32 = 1;

/// `3×(high validation warnings) + 2×(high comparison discrepancies) +
/// (all medium warnings and discrepancies combined)`.
pub fn compute_priority(
    high_validation: u32,
    high_comparison: u32,
    medium_combined: u32,
) -> u32 {
    VALIDATION_HIGH_WEIGHT * high_validation
        + COMPARISON_HIGH_WEIGHT * high_comparison
        + MEDIUM_WEIGHT * medium_combined
}

/// Build a review entry from an item's warnings and (optional)
/// cross-model comparison. Returns `None` when the item does not meet
/// the review threshold.
pub fn build_review_entry(
    item_id: &str,
    warnings: &[ValidationWarning],
    comparison: Option<&ComparisonResult>,
) -> Option<ReviewEntry> {
    let high_validation = count_warnings(warnings, Severity::High);
    let medium_validation = count_warnings(warnings, Severity::Medium);

    let (high_comparison, medium_comparison, total_discrepancies, recommends) = match comparison {
        Some(result) => (
            result.count_with_severity(Severity::High) as u32,
            result.count_with_severity(Severity::Medium) as u32,
            result.discrepancies.len() as u32,
            result.recommends_review,
        ),
        None => (0, 0, 0, false),
    };

    let priority = compute_priority(
        high_validation,
        high_comparison,
        medium_validation + medium_comparison,
    );

    if priority == 0 && !recommends {
        return None;
    }

    Some(ReviewEntry {
        item_id: item_id.to_string(),
        total_discrepancies,
        high_count: high_validation + high_comparison,
        medium_count: medium_validation + medium_comparison,
        priority,
        status: ReviewStatus::Pending,
        updated_at: Utc::now(),
    })
}

fn count_warnings(warnings: &[ValidationWarning], severity: Severity) -> u32 {
    warnings.iter().filter(|w| w.severity == severity).count() as u32
}
