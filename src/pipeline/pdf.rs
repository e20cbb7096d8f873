//! Scanned-PDF extraction path.
//!
//! Control flow: render the first pages, OCR each, run pattern recovery
//! over the concatenated text, then escalate to the vision model in two
//! situations — no line items recovered, or the completeness check fails.
//! Escalation failures degrade gracefully back to the OCR result; only
//! render/OCR failures are fatal for this path.

use std::sync::Arc;

use crate::models::FiscalDocument;
use crate::pipeline::completeness::CompletenessPolicy;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::pdf_render::PdfPageRenderer;
use crate::pipeline::vision::VisionExtractor;
use crate::pipeline::{merge, patterns, ExtractError};

/// Pages beyond this add OCR cost without adding fiscal fields.
const MAX_PAGES: usize = 3;

pub struct PdfExtractor {
    renderer: Arc<dyn PdfPageRenderer>,
    ocr: Arc<dyn OcrEngine>,
    /// `None` when no vision credentials are configured; the path then
    /// runs OCR-only.
    vision: Option<Arc<VisionExtractor>>,
    dpi: u32,
    policy: CompletenessPolicy,
}

impl PdfExtractor {
    pub fn new(
        renderer: Arc<dyn PdfPageRenderer>,
        ocr: Arc<dyn OcrEngine>,
        vision: Option<Arc<VisionExtractor>>,
        dpi: u32,
        policy: CompletenessPolicy,
    ) -> Self {
        Self {
            renderer,
            ocr,
            vision,
            dpi,
            policy,
        }
    }

    /// Extract from PDF bytes. Returns the document plus whether an LLM
    /// call contributed to it.
    pub async fn extract(&self, pdf: &[u8]) -> Result<(FiscalDocument, bool), ExtractError> {
        let (text, first_page) = self.ocr_pages(pdf).await?;
        let mut doc = patterns::extract_document(&text);
        let mut llm_enhanced = false;

        if doc.line_items.is_empty() {
            if let Some(vision) = &self.vision {
                match vision.extract_items_from_text(&text).await {
                    Ok(items) if !items.is_empty() => {
                        tracing::info!(count = items.len(), "itens recuperados via LLM");
                        doc.line_items = items;
                        llm_enhanced = true;
                    }
                    Ok(_) => {
                        tracing::info!("LLM também não encontrou itens legíveis");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "falha na recuperação de itens, seguindo sem eles");
                    }
                }
            }
        }

        let report = self.policy.evaluate(&doc);
        if report.incomplete {
            if let Some(vision) = &self.vision {
                tracing::info!(
                    missing = ?report.missing,
                    ratio = report.ratio,
                    "extração incompleta, escalando para visão"
                );
                let enhanced = vision
                    .enhance_from_image(&first_page, &doc, &text, &report.missing)
                    .await;
                match enhanced {
                    Ok(enhancement) => {
                        doc = merge::merge(&doc, &enhancement);
                        llm_enhanced = true;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "falha na visão, mantendo resultado do OCR");
                    }
                }
            } else {
                tracing::warn!(
                    missing = ?report.missing,
                    "extração incompleta e sem credenciais de visão"
                );
            }
        }

        Ok((doc, llm_enhanced))
    }

    /// Render and OCR up to [`MAX_PAGES`] pages on the blocking pool,
    /// returning the concatenated text and the first rendered page.
    async fn ocr_pages(&self, pdf: &[u8]) -> Result<(String, Vec<u8>), ExtractError> {
        let renderer = Arc::clone(&self.renderer);
        let ocr = Arc::clone(&self.ocr);
        let pdf = pdf.to_vec();
        let dpi = self.dpi;

        tokio::task::spawn_blocking(move || {
            let total = renderer.page_count(&pdf)?;
            if total == 0 {
                return Err(ExtractError::PdfRendering("PDF sem páginas".into()));
            }
            let count = total.min(MAX_PAGES);

            let mut text = String::new();
            let mut first_page = Vec::new();
            for index in 0..count {
                let image = renderer.render_page(&pdf, index, dpi)?;
                let page_text = ocr.recognize(&image)?;
                if index == 0 {
                    first_page = image;
                }
                text.push_str(&format!("--- PÁGINA {} ---\n", index + 1));
                text.push_str(&page_text);
                text.push('\n');
            }
            tracing::debug!(pages = count, total_pages = total, chars = text.len(), "OCR concluído");
            Ok((text, first_page))
        })
        .await
        .map_err(|e| ExtractError::OcrProcessing(format!("tarefa de OCR abortada: {e}")))?
    }
}
