//! Public boundary of the pipeline.
//!
//! `DocumentProcessor` owns the wiring (renderer, OCR engine, LLM client,
//! cache, retry policy) and turns raw uploads into `ProcessingResult`
//! envelopes. It never panics on bad input and never lets one document of
//! a batch take the others down.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::Settings;
use crate::llm::{LlmClient, OpenAiClient, ResponseCache, RetryConfig};
use crate::models::{Extractor, FiscalDocument, ProcessingResult};
use crate::pipeline::completeness::CompletenessPolicy;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::pdf::PdfExtractor;
use crate::pipeline::pdf_render::{PdfPageRenderer, PdfiumRenderer};
use crate::pipeline::vision::VisionExtractor;
use crate::pipeline::{xml, ExtractError, FileType};

pub struct DocumentProcessor {
    settings: Settings,
    semaphore: Arc<Semaphore>,
    pdf: PdfExtractor,
    vision: Option<Arc<VisionExtractor>>,
    cache: Arc<ResponseCache>,
}

impl DocumentProcessor {
    /// Production wiring: pdfium renderer, Tesseract OCR (when the `ocr`
    /// feature is compiled in), OpenAI vision when a key is configured.
    pub fn new(settings: Settings) -> Self {
        #[cfg(feature = "ocr")]
        let ocr: Arc<dyn OcrEngine> = Arc::new(crate::pipeline::ocr::TesseractOcr::new(
            settings.ocr_lang.clone(),
            settings.ocr_psm,
        ));
        #[cfg(not(feature = "ocr"))]
        let ocr: Arc<dyn OcrEngine> = Arc::new(crate::pipeline::ocr::DisabledOcr);

        let client: Option<Arc<dyn LlmClient>> = settings
            .openai_api_key
            .as_deref()
            .map(|key| Arc::new(OpenAiClient::new(key)) as Arc<dyn LlmClient>);

        Self::with_components(settings, Arc::new(PdfiumRenderer), ocr, client)
    }

    /// Explicit wiring, used by tests and embedders with their own
    /// backends.
    pub fn with_components(
        settings: Settings,
        renderer: Arc<dyn PdfPageRenderer>,
        ocr: Arc<dyn OcrEngine>,
        client: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(settings.cache_ttl_secs),
            settings.enable_caching,
        ));
        let retry = RetryConfig {
            max_attempts: settings.llm_retry_attempts,
            base_delay: settings.llm_retry_delay,
            max_delay: 60.0,
            exponential_base: settings.llm_retry_backoff,
        };
        let vision = client.map(|client| {
            Arc::new(VisionExtractor::new(
                client,
                Arc::clone(&cache),
                retry,
                settings.llm_model.clone(),
                settings.llm_temperature,
                settings.llm_max_tokens,
            ))
        });
        let pdf = PdfExtractor::new(
            renderer,
            ocr,
            vision.clone(),
            settings.pdf_dpi,
            CompletenessPolicy {
                threshold: settings.completeness_threshold,
            },
        );

        Self {
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_processing)),
            pdf,
            vision,
            cache,
            settings,
        }
    }

    /// Start the periodic cache sweep. Call once from within a runtime.
    pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.cache.spawn_sweeper()
    }

    /// Process one uploaded document. Always returns an envelope.
    pub async fn process(&self, file_name: &str, content: &[u8]) -> ProcessingResult {
        let started = Instant::now();

        let Some(file_type) = FileType::from_filename(file_name) else {
            let err = ExtractError::UnsupportedFileType(file_name.to_string());
            tracing::warn!(file = file_name, "tipo de arquivo não suportado");
            return ProcessingResult::failed(file_name, None, err.to_string(), elapsed(started));
        };

        tracing::info!(
            file = file_name,
            file_type = file_type.as_str(),
            size = content.len(),
            "processando documento"
        );

        match self.run(file_type, content).await {
            Ok((document, extractor, llm_enhanced)) => {
                tracing::info!(
                    file = file_name,
                    extractor = ?extractor,
                    llm_enhanced,
                    elapsed_secs = elapsed(started),
                    "documento processado"
                );
                ProcessingResult::ok(
                    file_name,
                    file_type,
                    extractor,
                    llm_enhanced,
                    document,
                    elapsed(started),
                )
            }
            Err(err) => {
                tracing::error!(file = file_name, error = %err, "falha no processamento");
                ProcessingResult::failed(
                    file_name,
                    Some(file_type),
                    err.to_string(),
                    elapsed(started),
                )
            }
        }
    }

    /// Process a batch with per-item isolation. Fan-out is bounded by its
    /// own gate (`max_batch_size`), independent of the shared extraction
    /// semaphore; oversize batches queue on the gate instead of being
    /// rejected, and individual failures stay individual.
    pub async fn process_batch(&self, files: &[(String, Vec<u8>)]) -> Vec<ProcessingResult> {
        let batch_gate = Semaphore::new(self.settings.max_batch_size);
        join_all(files.iter().map(|(name, content)| {
            let gate = &batch_gate;
            async move {
                // The gate is never closed, so acquire cannot fail.
                let _slot = gate.acquire().await.ok();
                self.process(name, content).await
            }
        }))
        .await
    }

    async fn run(
        &self,
        file_type: FileType,
        content: &[u8],
    ) -> Result<(FiscalDocument, Extractor, bool), ExtractError> {
        // Validation happens before any extractor sees the bytes.
        if content.is_empty() {
            return Err(ExtractError::EmptyFile);
        }
        if content.len() > self.settings.max_file_size {
            return Err(ExtractError::FileTooLarge {
                size: content.len(),
                limit: self.settings.max_file_size,
            });
        }
        if file_type.is_image() && self.vision.is_none() {
            return Err(ExtractError::MissingApiKey);
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ExtractError::Io(std::io::Error::other(e)))?;

        match file_type {
            FileType::Xml => {
                let bytes = content.to_vec();
                let doc = tokio::task::spawn_blocking(move || xml::extract_document(&bytes))
                    .await
                    .map_err(|e| ExtractError::XmlParsing(format!("tarefa abortada: {e}")))??;
                Ok((doc, Extractor::Xml, false))
            }
            FileType::Pdf => {
                let (doc, llm_enhanced) = self.pdf.extract(content).await?;
                Ok((doc, Extractor::PdfOcr, llm_enhanced))
            }
            _ => {
                // Image path: is_image() was checked above, vision exists.
                // Vision is the primary extractor here, not an enhancement,
                // so the llm_enhanced flag stays off.
                let vision = self.vision.as_ref().ok_or(ExtractError::MissingApiKey)?;
                let doc = vision.extract_from_image(content).await?;
                Ok((doc, Extractor::Vision, false))
            }
        }
    }
}

fn elapsed(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}
