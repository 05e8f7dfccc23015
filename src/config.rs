use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Nutrilens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "nutrilens=info".to_string()
}

/// Get the application data directory
/// ~/Nutrilens/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Nutrilens")
}

/// Get the results database path.
///
/// `NUTRILENS_DB` overrides the default location.
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("NUTRILENS_DB") {
        return PathBuf::from(path);
    }
    app_data_dir().join("extractions.db")
}

/// Tunable knobs for a pipeline run.
///
/// Defaults are conservative: they respect typical provider rate limits
/// and keep concurrency low enough for a laptop-grade machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Primary vision model name.
    pub primary_model: String,
    /// Secondary vision model for cross-checking, if enabled.
    pub secondary_model: String,
    /// Requests admitted per rolling minute, per provider.
    pub requests_per_minute: u32,
    /// Items started concurrently within an orchestrator window.
    pub concurrency: usize,
    /// Maximum provider-call attempts (initial call + retries).
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Backoff multiplier per attempt.
    pub retry_multiplier: f64,
    /// Backoff cap in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Provider call timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o".to_string(),
            secondary_model: "llama3.2-vision".to_string(),
            requests_per_minute: 20,
            concurrency: 4,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_multiplier: 2.0,
            retry_max_delay_ms: 10_000,
            request_timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Nutrilens"));
    }

    #[test]
    fn default_config_is_bounded() {
        let config = PipelineConfig::default();
        assert!(config.concurrency >= 1);
        assert!(config.max_attempts >= 1);
        assert!(config.retry_base_delay_ms <= config.retry_max_delay_ms);
    }

    #[test]
    fn app_name_is_nutrilens() {
        assert_eq!(APP_NAME, "Nutrilens");
    }
}
