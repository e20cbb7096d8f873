//! Extraction pipeline: modality-specific extractors, completeness-driven
//! escalation, and the processor that fronts them all.
//!
//! ```text
//!   bytes ──▶ validate ──▶ XML  ─────────────────────────────┐
//!                     └──▶ PDF ──▶ render ▶ OCR ▶ patterns ──┼──▶ FiscalDocument
//!                     │         └▶ vision enhance (if incomplete)
//!                     └──▶ image ▶ vision ────────────────────┘
//! ```

pub mod completeness;
pub mod merge;
pub mod normalize;
pub mod ocr;
pub mod patterns;
pub mod pdf;
pub mod pdf_render;
pub mod processor;
pub mod prompt;
pub mod vision;
pub mod xml;

use thiserror::Error;

pub use crate::models::FileType;
pub use processor::DocumentProcessor;

/// Failures across the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("arquivo XML inválido: {0}")]
    XmlParsing(String),

    #[error("falha ao renderizar PDF: {0}")]
    PdfRendering(String),

    #[error("falha no OCR: {0}")]
    OcrProcessing(String),

    #[error("falha ao processar imagem: {0}")]
    ImageProcessing(String),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),

    #[error("tipo de arquivo não suportado: {0}")]
    UnsupportedFileType(String),

    #[error("arquivo vazio")]
    EmptyFile,

    #[error("arquivo excede o limite: {size} bytes (máximo {limit})")]
    FileTooLarge { size: usize, limit: usize },

    #[error("chave de API não configurada para extração por visão")]
    MissingApiKey,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
