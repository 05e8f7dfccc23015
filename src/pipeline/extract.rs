//! Extraction client — drives one (item, provider) attempt through rate
//! limiting, the provider call, the recovery cascade, and validation.
//!
//! Phases: NotStarted → RateLimited → Calling → Parsing → Validating →
//! {Succeeded | Salvaged | Failed}. Salvaged is a success state: a
//! best-effort record with warnings beats no record.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::models::{ProductExtraction, ValidationWarning};
use crate::pipeline::diagnostic;
use crate::pipeline::prompts;
use crate::pipeline::providers::{DocumentPayload, VisionProvider};
use crate::pipeline::rate_limit::RateLimiter;
use crate::pipeline::recovery::{self, shapes, RecoveryStrategy};
use crate::pipeline::retry::{with_retry, RetryPolicy};
use crate::pipeline::salvage::salvage_extraction;
use crate::pipeline::validate::validate_extraction;

/// Terminal phase of an extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPhase {
    Succeeded,
    Salvaged,
    Failed,
}

/// Outcome of one (item, provider) attempt. Immutable once finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub item_id: String,
    pub provider: String,
    pub success: bool,
    pub phase: ExtractionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProductExtraction>,
    /// Raw provider text, retained for debugging and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RecoveryStrategy>,
    pub warnings: Vec<ValidationWarning>,
}

/// Per-provider extraction client. The rate limiter handle is shared
/// across every client instance for the same provider.
pub struct ExtractionClient {
    provider: Arc<dyn VisionProvider>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ExtractionClient {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            limiter,
            policy,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one extraction attempt to a terminal outcome. This never
    /// returns an error: every failure mode is folded into the outcome.
    pub async fn extract(&self, item_id: &str, payload: &DocumentPayload) -> ExtractionOutcome {
        let start = Instant::now();
        let provider_name = self.provider.name().to_string();

        // RateLimited → Calling
        self.limiter.acquire().await;

        let context = format!("extract {item_id} via {provider_name}");
        let user_prompt = prompts::full_extraction_prompt(payload.ocr_text.as_deref());
        let call = with_retry(&self.policy, &context, || {
            self.provider
                .invoke(prompts::EXTRACTION_SYSTEM_PROMPT, &user_prompt, payload)
        })
        .await;

        let (raw, retry_count) = match call {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    item_id,
                    provider = %provider_name,
                    class = %err.class,
                    attempts = err.attempts,
                    "Provider call failed"
                );
                return ExtractionOutcome {
                    item_id: item_id.to_string(),
                    provider: provider_name,
                    success: false,
                    phase: ExtractionPhase::Failed,
                    data: None,
                    raw_response: None,
                    error: Some(err.to_string()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    retry_count: err.attempts.saturating_sub(1),
                    strategy: None,
                    warnings: Vec::new(),
                };
            }
        };

        // Calling → Parsing
        let recovered = match recovery::recover(&raw, &shapes::FULL_EXTRACTION) {
            Ok(recovered) => recovered,
            Err(failure) => {
                tracing::warn!(
                    item_id,
                    provider = %provider_name,
                    anomalies = ?failure.anomalies,
                    "Recovery cascade exhausted; dumping raw response"
                );
                diagnostic::spawn_dump(item_id.to_string(), raw.clone());
                return ExtractionOutcome {
                    item_id: item_id.to_string(),
                    provider: provider_name,
                    success: false,
                    phase: ExtractionPhase::Failed,
                    data: None,
                    raw_response: Some(raw),
                    error: Some(failure.to_string()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    retry_count,
                    strategy: None,
                    warnings: Vec::new(),
                };
            }
        };

        if recovered.strategy.is_last_resort() {
            // Frequent repair/lenient wins mean the prompt needs work.
            tracing::warn!(
                item_id,
                provider = %provider_name,
                strategy = %recovered.strategy,
                "Response needed a last-resort recovery strategy"
            );
        }

        // Parsing → Validating
        match validate_extraction(&recovered.value) {
            Ok(record) => ExtractionOutcome {
                item_id: item_id.to_string(),
                provider: provider_name,
                success: true,
                phase: ExtractionPhase::Succeeded,
                data: Some(record),
                raw_response: Some(raw),
                error: None,
                elapsed_ms: start.elapsed().as_millis() as u64,
                retry_count,
                strategy: Some(recovered.strategy),
                warnings: Vec::new(),
            },
            Err(failure) => match salvage_extraction(&recovered.value, &failure.errors) {
                Some(salvaged) => {
                    tracing::info!(
                        item_id,
                        provider = %provider_name,
                        warning_count = salvaged.warnings.len(),
                        "Strict validation failed; salvaged partial record"
                    );
                    ExtractionOutcome {
                        item_id: item_id.to_string(),
                        provider: provider_name,
                        success: true,
                        phase: ExtractionPhase::Salvaged,
                        data: Some(salvaged.record),
                        raw_response: Some(raw),
                        error: None,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        retry_count,
                        strategy: Some(recovered.strategy),
                        warnings: salvaged.warnings,
                    }
                }
                None => ExtractionOutcome {
                    item_id: item_id.to_string(),
                    provider: provider_name,
                    success: false,
                    phase: ExtractionPhase::Failed,
                    data: None,
                    raw_response: Some(raw),
                    error: Some(failure.to_string()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    retry_count,
                    strategy: Some(recovered.strategy),
                    warnings: Vec::new(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::pipeline::providers::MockProvider;

    fn client_with(provider: MockProvider) -> ExtractionClient {
        let policy = RetryPolicy {
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..Default::default()
        };
        ExtractionClient::new(
            Arc::new(provider),
            Arc::new(RateLimiter::per_minute("mock", 100)),
            policy,
        )
    }

    fn clean_response() -> &'static str {
        r#"{"product_name": "Daily Multi", "brand": "Acme",
            "supplement_facts": {"serving_size": "1 tablet",
                "nutrients": [{"name": "Vitamin D", "amount": "25 mcg", "daily_value": "125%"}]},
            "ingredients": ["cellulose"]}"#
    }

    #[tokio::test]
    async fn clean_response_succeeds_with_direct_parse() {
        let client = client_with(MockProvider::new("mock", clean_response()));
        let outcome = client.extract("item-1", &DocumentPayload::default()).await;

        assert!(outcome.success);
        assert_eq!(outcome.phase, ExtractionPhase::Succeeded);
        assert_eq!(outcome.strategy, Some(RecoveryStrategy::DirectParse));
        assert_eq!(outcome.retry_count, 0);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.data.unwrap().nutrient_count(), 1);
    }

    #[tokio::test]
    async fn prose_wrapped_response_recovers_and_succeeds() {
        let wrapped = format!("Here is the extracted data:\n{}\nLet me know!", clean_response());
        let client = client_with(MockProvider::new("mock", &wrapped));
        let outcome = client.extract("item-2", &DocumentPayload::default()).await;

        assert!(outcome.success);
        assert_eq!(outcome.strategy, Some(RecoveryStrategy::BalancedDelimiters));
    }

    #[tokio::test]
    async fn invalid_amounts_salvage_with_warnings() {
        let response = r#"{"product_name": "Daily Multi",
            "supplement_facts": {"nutrients": [
                {"name": "Iron", "amount": 18},
                {"name": "Zinc", "amount": "11 mg"}
            ]}}"#;
        let client = client_with(MockProvider::new("mock", response));
        let outcome = client.extract("item-3", &DocumentPayload::default()).await;

        assert!(outcome.success);
        assert_eq!(outcome.phase, ExtractionPhase::Salvaged);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.severity == Severity::High));
        // the panel survived field-by-field
        let record = outcome.data.unwrap();
        assert_eq!(record.nutrient_count(), 2);
    }

    #[tokio::test]
    async fn unrecoverable_response_fails_with_raw_kept() {
        let client = client_with(MockProvider::new("mock", "I could not read this label, sorry."));
        let outcome = client.extract("item-4", &DocumentPayload::default()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.phase, ExtractionPhase::Failed);
        assert!(outcome.raw_response.is_some());
        assert!(outcome.error.unwrap().contains("recovery strategies exhausted"));
    }

    #[tokio::test]
    async fn transient_provider_failures_are_retried() {
        let provider = MockProvider::with_sequence(
            "mock",
            vec![
                Err((503, "service unavailable".into())),
                Ok(clean_response().to_string()),
            ],
        );
        let client = client_with(provider);
        let outcome = client.extract("item-5", &DocumentPayload::default()).await;

        assert!(outcome.success);
        assert_eq!(outcome.retry_count, 1);
    }

    #[tokio::test]
    async fn non_retryable_provider_failure_fails_fast() {
        let provider = MockProvider::with_sequence(
            "mock",
            vec![Err((422, "invalid input: unsupported image".into()))],
        );
        let client = client_with(provider);
        let outcome = client.extract("item-6", &DocumentPayload::default()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.retry_count, 0);
        assert!(outcome.error.unwrap().contains("invalid input"));
    }
}
