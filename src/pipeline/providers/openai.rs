//! OpenAI-compatible vision adapter.
//!
//! Speaks the `/chat/completions` wire format with multimodal content
//! parts, which most hosted vision models accept. Credentials come from
//! the environment; the endpoint is overridable for compatible gateways.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DocumentPayload, ProviderError, VisionProvider};

/// Default public endpoint; `OPENAI_API_BASE` overrides.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Response token budget for a full-label extraction.
const MAX_TOKENS: usize = 4_096;

/// OpenAI-compatible chat-completions client.
pub struct OpenAiVision {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OpenAiVision {
    /// Build a client for `model`, reading `OPENAI_API_KEY` (required)
    /// and `OPENAI_API_BASE` (optional) from the environment.
    pub fn from_env(model: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Credentials("OPENAI_API_KEY is not set".into()))?;
        let base_url =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(model, &api_key, &base_url, timeout_secs))
    }

    pub fn new(model: &str, api_key: &str, base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    #[serde(flatten)]
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text { content: String },
    Multimodal { content: Vec<ContentPart> },
}

#[derive(Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl VisionProvider for OpenAiVision {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        payload: &DocumentPayload,
    ) -> Result<String, ProviderError> {
        let mut parts = vec![ContentPart::Text {
            text: user_prompt.to_string(),
        }];
        for page in &payload.pages {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{page}", payload.media_type),
                    detail: "high",
                },
            });
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text {
                        content: system_prompt.to_string(),
                    },
                },
                Message {
                    role: "user",
                    content: MessageContent::Multimodal { content: parts },
                },
            ],
            max_tokens: MAX_TOKENS,
            // Zero temperature for maximum determinism across runs.
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ResponseParsing("no content in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = OpenAiVision::new("gpt-4o", "key", "https://gw.example.com/v1/", 60);
        assert_eq!(client.base_url, "https://gw.example.com/v1");
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn multimodal_request_serializes_data_urls() {
        let parts = vec![
            ContentPart::Text {
                text: "extract".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,QUJD".into(),
                    detail: "high",
                },
            },
        ];
        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(json[0]["type"], "text");
        assert_eq!(json[1]["type"], "image_url");
        assert_eq!(json[1]["image_url"]["url"], "data:image/png;base64,QUJD");
        assert_eq!(json[1]["image_url"]["detail"], "high");
    }
}
