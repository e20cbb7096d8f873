//! Fiscora — multi-modal extraction pipeline for Brazilian fiscal documents.
//!
//! Ingests NF-e documents in three modalities and reconciles them into one
//! canonical [`models::FiscalDocument`]:
//!
//! - **XML** — deterministic parse of the government NF-e schema
//! - **PDF** — page rendering + OCR + regex recovery, with conditional
//!   LLM-vision enhancement when the cheap result is incomplete
//! - **Images** — direct LLM-vision extraction
//!
//! All LLM-touching paths go through the resilience layer in [`llm`]
//! (retry with exponential backoff + TTL response cache). The public
//! boundary is [`pipeline::DocumentProcessor`].

pub mod config;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;

pub use config::Settings;
pub use models::{FiscalDocument, ProcessingResult};
pub use pipeline::{DocumentProcessor, ExtractError, FileType};
