//! Vision-provider adapters.
//!
//! A provider does exactly one thing: send prompts plus page images, give
//! back raw text. Rate limiting, retry, and response recovery are layered
//! on top by the extraction client — none of that lives inside an adapter.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaVision;
pub use openai::OpenAiVision;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Cannot connect to provider at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Missing credentials: {0}")]
    Credentials(String),
}

/// One scanned document ready for a vision call: base64-encoded page
/// images plus optional pre-extracted text from the conversion step.
#[derive(Debug, Clone, Default)]
pub struct DocumentPayload {
    pub pages: Vec<String>,
    pub media_type: String,
    pub ocr_text: Option<String>,
}

impl DocumentPayload {
    pub fn from_page(page_base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            pages: vec![page_base64.into()],
            media_type: media_type.into(),
            ocr_text: None,
        }
    }
}

/// Vision-capable model behind an HTTP API (allows mocking).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Stable provider name, used for rate-limiter keying and logs.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Send one extraction request; returns the model's raw text.
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        payload: &DocumentPayload,
    ) -> Result<String, ProviderError>;
}

/// Scripted provider for tests — plays back a response sequence, the last
/// entry repeating.
pub struct MockProvider {
    name: String,
    responses: std::sync::Mutex<Vec<Result<String, (u16, String)>>>,
    calls: std::sync::atomic::AtomicU32,
}

impl MockProvider {
    pub fn new(name: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: std::sync::Mutex::new(vec![Ok(response.to_string())]),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn with_sequence(name: &str, responses: Vec<Result<String, (u16, String)>>) -> Self {
        Self {
            name: name.to_string(),
            responses: std::sync::Mutex::new(responses),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-vision"
    }

    async fn invoke(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _payload: &DocumentPayload,
    ) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) as usize;
        let responses = self.responses.lock().expect("mock lock");
        let entry = responses
            .get(call)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_else(|| Ok(String::new()));
        match entry {
            Ok(text) => Ok(text),
            Err((status, body)) => Err(ProviderError::Api { status, body }),
        }
    }
}
