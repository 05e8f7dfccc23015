//! Recovery cascade — coerces unreliable free-form model output into a
//! parsed JSON value.
//!
//! Six strategies run in a fixed order, each consulted only when the
//! previous one failed or its candidate was rejected by the shape
//! validator. Strategies are pure functions over `&str`, so each is
//! unit-testable in isolation; this module owns only the driver loop and
//! failure diagnostics.

pub mod balanced;
pub mod cleanup;
pub mod fenced;
pub mod lenient;
pub mod repair;
pub mod shapes;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use balanced::{balanced_object_or_tail, extract_balanced_object};
use cleanup::strip_boilerplate;
use fenced::extract_fenced_block;
use lenient::lenient_parse;
use repair::{repair_structure, MAX_STRING_LEN};
use shapes::ShapeValidator;

/// Which strategy produced the accepted value.
///
/// Callers log repeated `StructuralRepair`/`LenientParse` wins: they mean
/// the upstream prompt needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    DirectParse,
    BalancedDelimiters,
    FencedBlock,
    CleanupRetry,
    StructuralRepair,
    LenientParse,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectParse => "direct_parse",
            Self::BalancedDelimiters => "balanced_delimiters",
            Self::FencedBlock => "fenced_block",
            Self::CleanupRetry => "cleanup_retry",
            Self::StructuralRepair => "structural_repair",
            Self::LenientParse => "lenient_parse",
        }
    }

    /// True for the strategies that rewrite the text before parsing.
    pub fn is_last_resort(&self) -> bool {
        matches!(self, Self::StructuralRepair | Self::LenientParse)
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A successfully recovered value plus the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Recovered {
    pub value: Value,
    pub strategy: RecoveryStrategy,
}

/// Input anomalies detected when every strategy fails, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    /// A raw (unescaped) newline inside a quoted string.
    RawNewlineInString,
    /// Adjacent quote pair suggesting an unterminated string.
    AdjacentQuotes,
    /// A string value beyond the truncation bound.
    OversizedString { length: usize },
}

/// All six strategies exhausted.
#[derive(Debug, Clone, Error)]
#[error("all recovery strategies exhausted (input preview: {preview:?}, anomalies: {anomalies:?})")]
pub struct RecoveryFailure {
    /// Truncated head of the offending input.
    pub preview: String,
    pub anomalies: Vec<Anomaly>,
}

/// Characters of input kept in a failure preview.
const PREVIEW_LEN: usize = 240;

/// The fixed strategy order. Each entry is a pure `text -> candidate`
/// function; the driver short-circuits on the first shape-accepted result.
const STRATEGIES: [(RecoveryStrategy, fn(&str) -> Option<Value>); 6] = [
    (RecoveryStrategy::DirectParse, try_direct),
    (RecoveryStrategy::BalancedDelimiters, try_balanced),
    (RecoveryStrategy::FencedBlock, try_fenced),
    (RecoveryStrategy::CleanupRetry, try_cleanup),
    (RecoveryStrategy::StructuralRepair, try_repair),
    (RecoveryStrategy::LenientParse, try_lenient),
];

/// Run the cascade over `raw` until a strategy yields a value accepted by
/// `shape`.
pub fn recover(raw: &str, shape: &ShapeValidator) -> Result<Recovered, RecoveryFailure> {
    let text = sanitize_model_output(raw);

    for (strategy, attempt) in STRATEGIES {
        let Some(value) = attempt(&text) else {
            continue;
        };
        if shape.matches(&value) {
            tracing::debug!(strategy = %strategy, shape = shape.name, "Recovery succeeded");
            return Ok(Recovered { value, strategy });
        }
        tracing::trace!(
            strategy = %strategy,
            shape = shape.name,
            "Candidate rejected by shape validator"
        );
    }

    Err(RecoveryFailure {
        preview: preview(&text),
        anomalies: detect_anomalies(&text),
    })
}

/// Strip model thinking tags and stray control tokens before the cascade
/// sees the text.
pub fn sanitize_model_output(raw: &str) -> String {
    let mut text = raw;

    if let Some(start) = text.find("<think>") {
        if let Some(end) = text[start..].find("</think>") {
            return format!(
                "{}{}",
                &text[..start],
                &text[start + end + "</think>".len()..]
            )
            .trim()
            .to_string();
        }
        text = &text[..start];
    }

    text.trim().to_string()
}

fn try_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn try_balanced(text: &str) -> Option<Value> {
    extract_balanced_object(text).and_then(try_direct)
}

fn try_fenced(text: &str) -> Option<Value> {
    extract_fenced_block(text).and_then(try_direct)
}

fn try_cleanup(text: &str) -> Option<Value> {
    let cleaned = strip_boilerplate(text);
    try_direct(&cleaned).or_else(|| try_balanced(&cleaned))
}

fn try_repair(text: &str) -> Option<Value> {
    let candidate = balanced_object_or_tail(text)?;
    try_direct(&repair_structure(candidate))
}

fn try_lenient(text: &str) -> Option<Value> {
    lenient_parse(balanced_object_or_tail(text).unwrap_or(text))
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LEN {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_LEN).collect();
    format!("{head}…")
}

/// Heuristic scan for the damage patterns the repair strategy targets.
/// Run only on total failure; the result goes into logs, never decisions.
fn detect_anomalies(text: &str) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut run_len = 0usize;
    let mut max_run = 0usize;
    let mut saw_raw_newline = false;
    let mut saw_adjacent_quotes = false;
    let mut prev: Option<char> = None;
    // Last non-quote, non-whitespace char — distinguishes a legitimate
    // empty string (`: ""`, `[""`) from a suspicious bare quote pair.
    let mut last_nonquote: Option<char> = None;

    for ch in text.chars() {
        if escaped {
            escaped = false;
            prev = Some(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => {
                if prev == Some('"')
                    && !matches!(last_nonquote, Some(':') | Some('[') | Some(','))
                {
                    saw_adjacent_quotes = true;
                }
                in_string = !in_string;
                if in_string {
                    run_len = 0;
                } else {
                    max_run = max_run.max(run_len);
                }
            }
            '\n' | '\r' if in_string => saw_raw_newline = true,
            _ if in_string => run_len += 1,
            _ => {}
        }
        if ch != '"' && !ch.is_whitespace() {
            last_nonquote = Some(ch);
        }
        prev = Some(ch);
    }
    if in_string {
        max_run = max_run.max(run_len);
    }

    if saw_raw_newline {
        anomalies.push(Anomaly::RawNewlineInString);
    }
    if saw_adjacent_quotes {
        anomalies.push(Anomaly::AdjacentQuotes);
    }
    if max_run > MAX_STRING_LEN {
        anomalies.push(Anomaly::OversizedString { length: max_run });
    }

    anomalies
}
