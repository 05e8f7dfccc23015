//! Classified, bounded, jittered retry for provider calls.
//!
//! Error classification is message-content matching against a declarative
//! marker table — the table, not the logic, is what gets tuned. Retry is
//! an explicit bounded loop (no recursion), so cancellation and timeout
//! compose naturally around it.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::config::PipelineConfig;

/// Failure classes at the provider-call layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    Network,
    InvalidInput,
    Validation,
    ProviderError,
    Unknown,
}

impl ErrorClass {
    /// Only transient classes are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Timeout | Self::Network | Self::ProviderError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::InvalidInput => "invalid_input",
            Self::Validation => "validation",
            Self::ProviderError => "provider_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marker table for classification. Checked in order, first match wins,
/// matching is case-insensitive substring.
const CLASS_MARKERS: &[(ErrorClass, &[&str])] = &[
    (
        ErrorClass::RateLimit,
        &["rate limit", "rate_limit", "429", "too many requests", "quota exceeded"],
    ),
    (ErrorClass::Timeout, &["timeout", "timed out", "deadline exceeded"]),
    (
        ErrorClass::Network,
        &["network", "connection", "connect", "dns", "socket", "broken pipe"],
    ),
    (
        ErrorClass::InvalidInput,
        &["invalid input", "unsupported image", "payload too large", "400 bad request"],
    ),
    (ErrorClass::Validation, &["validation", "schema mismatch"]),
    (
        ErrorClass::ProviderError,
        &["500", "502", "503", "overloaded", "internal server", "service unavailable"],
    ),
];

/// Classify an error by its message text.
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    for (class, markers) in CLASS_MARKERS {
        if markers.iter().any(|m| lower.contains(m)) {
            return *class;
        }
    }
    ErrorClass::Unknown
}

/// Backoff configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

/// Jitter added on top of every computed delay.
const JITTER_MS: u64 = 1_000;

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            multiplier: config.retry_multiplier,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }

    /// Delay before the attempt following failed attempt `attempt_index`
    /// (zero-based): `min(base * multiplier^i, cap)` plus uniform jitter.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let exponential = self.base_delay_ms as f64 * self.multiplier.powi(attempt_index as i32);
        let capped = exponential.min(self.max_delay_ms as f64) as u64;
        let jitter = rand::thread_rng().gen_range(0..=JITTER_MS);
        Duration::from_millis(capped + jitter)
    }
}

/// A failure that survived every permitted attempt.
#[derive(Debug, Clone, Error)]
#[error("{context} failed after {attempts} attempt(s) ({class}): {message}")]
pub struct RetryError {
    pub context: String,
    pub message: String,
    pub class: ErrorClass,
    pub attempts: u32,
}

/// Drive `operation` with classified, bounded, jittered backoff.
///
/// Returns the successful value together with the number of retries it
/// took (0 when the first attempt succeeded). Non-retryable failures
/// propagate immediately regardless of remaining attempts.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut operation: F,
) -> Result<(T, u32), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok((value, attempt - 1)),
            Err(err) => {
                let message = err.to_string();
                let class = classify(&message);

                if !class.is_retryable() || attempt == max_attempts {
                    return Err(RetryError {
                        context: context.to_string(),
                        message,
                        class,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_for(attempt - 1);
                tracing::warn!(
                    context,
                    attempt,
                    class = %class,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Transient provider failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop always returns within max_attempts")
}
