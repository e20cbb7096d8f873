//! OpenAI chat-completions client with vision support.
//!
//! Speaks the `/v1/chat/completions` wire format, attaching images as
//! base64 data URLs. Error mapping here feeds the retry policy: HTTP 5xx
//! and 429 become transient [`LlmError::Service`], other 4xx become
//! permanent [`LlmError::InvalidRequest`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};

use super::{LlmClient, LlmError, VisionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point at a compatible endpoint (proxy, Azure gateway, local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(request: &VisionRequest) -> Value {
        let content = match &request.image {
            Some(bytes) => {
                let mime = detect_mime(bytes);
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                json!([
                    {"type": "text", "text": request.prompt},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:{mime};base64,{encoded}")
                    }}
                ])
            }
            None => json!(request.prompt),
        };
        json!({
            "model": request.model,
            "messages": [{"role": "user", "content": content}],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn map_transport_error(err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_connect() {
            LlmError::Connection(err.to_string())
        } else {
            LlmError::Service(err.to_string())
        }
    }
}

/// Data-URL mime from magic bytes. PNG and JPEG are what the renderer
/// and the accepted upload types produce; anything else ships as JPEG
/// and lets the service complain.
fn detect_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &VisionRequest) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingCredentials);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("status {status}: {}", truncate(&body, 300));
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(LlmError::Service(detail))
            } else {
                Err(LlmError::InvalidRequest(detail))
            };
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".into()))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_body_uses_plain_string_content() {
        let body = OpenAiClient::build_body(&VisionRequest {
            model: "gpt-4o".into(),
            prompt: "extraia os campos".into(),
            image: None,
            temperature: 0.1,
            max_tokens: 2000,
        });
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"], "extraia os campos");
        assert_eq!(body["max_tokens"], 2000);
    }

    #[test]
    fn image_body_attaches_data_url() {
        let png = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3];
        let body = OpenAiClient::build_body(&VisionRequest {
            model: "gpt-4o".into(),
            prompt: "extraia".into(),
            image: Some(png),
            temperature: 0.1,
            max_tokens: 2000,
        });
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn mime_detection_distinguishes_png_from_jpeg() {
        assert_eq!(detect_mime(&[0x89, b'P', b'N', b'G']), "image/png");
        assert_eq!(detect_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    #[tokio::test]
    async fn empty_api_key_fails_before_any_network_call() {
        let client = OpenAiClient::new("");
        let result = client
            .complete(&VisionRequest {
                model: "gpt-4o".into(),
                prompt: "x".into(),
                image: None,
                temperature: 0.1,
                max_tokens: 10,
            })
            .await;
        assert!(matches!(result, Err(LlmError::MissingCredentials)));
    }
}
