//! Per-document processing envelope returned by the processor.
//!
//! Batch processing never aborts on a single bad document; each input gets
//! its own `ProcessingResult`, success or failure, with enough metadata to
//! tell how the answer was produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::FiscalDocument;

/// Accepted upload types, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Xml,
    Pdf,
    Jpg,
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl FileType {
    /// Detect the type from a filename, case-insensitive on the
    /// extension; `None` for anything unsupported.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(Self::Xml),
            "pdf" => Some(Self::Pdf),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Whether this type goes down the direct vision path.
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Self::Jpg | Self::Jpeg | Self::Png | Self::Webp | Self::Gif
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

/// Which extraction path produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extractor {
    Xml,
    PdfOcr,
    Vision,
}

/// Extraction provenance, grouped apart from the main contract keys the
/// classification stage consumes by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Original filename as uploaded.
    pub file_name: String,
    /// Extraction path that produced the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<Extractor>,
    /// Whether an LLM call supplemented another extractor's result.
    pub llm_enhanced: bool,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of processing one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    /// Unique id of this processing attempt, for log correlation and
    /// downstream reference.
    pub document_id: Uuid,
    /// Detected type; `None` when detection itself failed.
    pub document_type: Option<FileType>,
    /// Extracted document on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<FiscalDocument>,
    /// Human-readable failure description on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Short human-readable status line.
    pub message: String,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
    pub metadata: ResultMetadata,
}

impl ProcessingResult {
    pub fn ok(
        file_name: impl Into<String>,
        file_type: FileType,
        extractor: Extractor,
        llm_enhanced: bool,
        document: FiscalDocument,
        processing_time: f64,
    ) -> Self {
        Self {
            success: true,
            document_id: Uuid::new_v4(),
            document_type: Some(file_type),
            extracted_data: Some(document),
            error: None,
            message: "Documento processado com sucesso".to_string(),
            processing_time,
            metadata: ResultMetadata {
                file_name: file_name.into(),
                extractor: Some(extractor),
                llm_enhanced,
                processed_at: Utc::now(),
            },
        }
    }

    pub fn failed(
        file_name: impl Into<String>,
        file_type: Option<FileType>,
        error: impl Into<String>,
        processing_time: f64,
    ) -> Self {
        Self {
            success: false,
            document_id: Uuid::new_v4(),
            document_type: file_type,
            extracted_data: None,
            error: Some(error.into()),
            message: "Falha no processamento do documento".to_string(),
            processing_time,
            metadata: ResultMetadata {
                file_name: file_name.into(),
                extractor: None,
                llm_enhanced: false,
                processed_at: Utc::now(),
            },
        }
    }
}
