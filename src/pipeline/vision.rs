//! Vision/LLM structured extraction.
//!
//! Wraps every model call in the resilience layer (cache outside retry:
//! a hit skips retry entirely, a miss pays the full resilient call) and
//! parses the reply under a strict no-fabrication contract — items
//! without a readable description never enter the result.

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::retry::with_retry;
use crate::llm::{LlmClient, ResponseCache, RetryConfig, VisionRequest};
use crate::models::{FiscalDocument, LineItem};
use crate::pipeline::{prompt, ExtractError};

pub struct VisionExtractor {
    client: Arc<dyn LlmClient>,
    cache: Arc<ResponseCache>,
    retry: RetryConfig,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl VisionExtractor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        cache: Arc<ResponseCache>,
        retry: RetryConfig,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            cache,
            retry,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    /// Full-document extraction from one fiscal document image.
    pub async fn extract_from_image(&self, image: &[u8]) -> Result<FiscalDocument, ExtractError> {
        let reply = self
            .resilient_call("vision_extract", prompt::extraction_prompt(), Some(image))
            .await?;
        parse_document_reply(&reply)
    }

    /// Full extraction focused on fields the cheap path missed, grounded
    /// with the partial result and the OCR text it came from.
    pub async fn enhance_from_image(
        &self,
        image: &[u8],
        base: &FiscalDocument,
        ocr_text: &str,
        missing_fields: &[String],
    ) -> Result<FiscalDocument, ExtractError> {
        let reply = self
            .resilient_call(
                "vision_enhance",
                prompt::enhancement_prompt(base, ocr_text, missing_fields),
                Some(image),
            )
            .await?;
        parse_document_reply(&reply)
    }

    /// Item-only recovery over OCR text, no image attached.
    pub async fn extract_items_from_text(
        &self,
        ocr_text: &str,
    ) -> Result<Vec<LineItem>, ExtractError> {
        let reply = self
            .resilient_call("items_from_text", prompt::items_prompt(ocr_text), None)
            .await?;
        let body = strip_fences(&reply);
        let envelope: ItemsEnvelope = serde_json::from_str(body)
            .map_err(|e| ExtractError::ImageProcessing(format!("resposta de itens inválida: {e}")))?;
        Ok(keep_real_items(envelope.items))
    }

    async fn resilient_call(
        &self,
        operation: &str,
        prompt: String,
        image: Option<&[u8]>,
    ) -> Result<String, ExtractError> {
        let key = ResponseCache::fingerprint(&[
            self.model.as_bytes(),
            prompt.as_bytes(),
            image.unwrap_or_default(),
        ]);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(operation, "resposta do LLM servida do cache");
            return Ok(cached);
        }

        let request = VisionRequest {
            model: self.model.clone(),
            prompt,
            image: image.map(|bytes| bytes.to_vec()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let reply = with_retry(&self.retry, operation, || self.client.complete(&request)).await?;
        self.cache.put(key, reply.clone());
        Ok(reply)
    }
}

#[derive(Deserialize)]
struct ItemsEnvelope {
    #[serde(rename = "itens", default)]
    items: Vec<LineItem>,
}

/// Parse a full-document reply. The model schema supplies defaults for
/// anything the reply omits; a reply that is not JSON at all is a hard
/// failure.
fn parse_document_reply(reply: &str) -> Result<FiscalDocument, ExtractError> {
    let body = strip_fences(reply);
    let mut doc: FiscalDocument = serde_json::from_str(body)
        .map_err(|e| ExtractError::ImageProcessing(format!("resposta do LLM inválida: {e}")))?;
    doc.line_items = keep_real_items(doc.line_items);
    Ok(doc)
}

/// Drop entries the model could not actually read. An empty list is the
/// correct answer for an unreadable document.
fn keep_real_items(items: Vec<LineItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .filter(|item| !item.description.trim().is_empty() && item.quantity > 0.0)
        .collect()
}

/// Strip optional markdown fences and surrounding chatter, keeping the
/// outermost JSON object.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if end > start => &inner[start..=end],
        _ => inner,
    }
}
