//! LLM access layer: client abstraction plus the resilience wrappers
//! (retry with exponential backoff, TTL response cache) every call goes
//! through.
//!
//! The pipeline only ever talks to `dyn LlmClient`, so tests swap in
//! [`MockLlmClient`] and production wires [`openai::OpenAiClient`].

pub mod cache;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use cache::ResponseCache;
pub use openai::OpenAiClient;
pub use retry::RetryConfig;

/// Errors from the LLM access layer.
///
/// The transient/permanent split drives the retry policy: only failures
/// that can plausibly clear on their own are worth a second attempt.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Upstream service degraded (5xx, overloaded, rate limited).
    #[error("llm service unavailable: {0}")]
    Service(String),

    /// Network-level failure reaching the service.
    #[error("llm connection failed: {0}")]
    Connection(String),

    /// The request ran out of time.
    #[error("llm request timed out: {0}")]
    Timeout(String),

    /// The request itself is wrong (bad model, malformed body, 4xx).
    /// Retrying an invalid request is wasted money.
    #[error("llm rejected request: {0}")]
    InvalidRequest(String),

    /// No API key configured for a path that needs one.
    #[error("llm credentials missing")]
    MissingCredentials,

    /// The service answered, but not with anything usable.
    #[error("llm returned malformed payload: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Service(_) | LlmError::Connection(_) | LlmError::Timeout(_)
        )
    }
}

/// One vision-extraction request: a prompt, optionally grounded on an image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub model: String,
    pub prompt: String,
    /// PNG/JPEG bytes to attach as an image part. `None` for text-only
    /// calls (e.g. structuring OCR text).
    pub image: Option<Vec<u8>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Minimal surface the pipeline needs from any LLM backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the raw assistant text.
    async fn complete(&self, request: &VisionRequest) -> Result<String, LlmError>;
}

/// Scripted client for tests: pops pre-loaded responses in order.
pub struct MockLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn push_ok(self, text: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn push_err(self, err: LlmError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    /// Number of `complete` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: &VisionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Service("mock exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_covers_retryable_failures() {
        assert!(LlmError::Service("503".into()).is_transient());
        assert!(LlmError::Connection("refused".into()).is_transient());
        assert!(LlmError::Timeout("30s".into()).is_transient());
        assert!(!LlmError::InvalidRequest("bad model".into()).is_transient());
        assert!(!LlmError::MissingCredentials.is_transient());
        assert!(!LlmError::MalformedResponse("not json".into()).is_transient());
    }

    #[tokio::test]
    async fn mock_client_pops_responses_in_order() {
        let mock = MockLlmClient::new()
            .push_ok("primeiro")
            .push_err(LlmError::Timeout("30s".into()));
        let request = VisionRequest {
            model: "gpt-4o".into(),
            prompt: "extract".into(),
            image: None,
            temperature: 0.1,
            max_tokens: 100,
        };
        assert_eq!(mock.complete(&request).await.unwrap(), "primeiro");
        assert!(matches!(
            mock.complete(&request).await,
            Err(LlmError::Timeout(_))
        ));
        assert_eq!(mock.call_count(), 2);
    }
}
