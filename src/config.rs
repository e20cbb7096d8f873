//! Centralized runtime configuration.
//!
//! Every tunable the pipeline consumes lives here with a documented default,
//! overridable through environment variables. Construct once and share via
//! `Arc` — nothing in the pipeline reads the environment directly.

use std::env;
use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "Fiscora";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime settings for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    // ── File intake ──────────────────────────────────────
    /// Maximum accepted upload size in bytes (default 200 MB).
    pub max_file_size: usize,

    // ── Concurrency ──────────────────────────────────────
    /// Maximum concurrent in-flight extractions.
    pub max_concurrent_processing: usize,
    /// Maximum documents processed in parallel inside one batch call.
    pub max_batch_size: usize,

    // ── OCR / PDF rendering ──────────────────────────────
    /// DPI for rendering PDF pages to images.
    pub pdf_dpi: u32,
    /// OCR recognition language (Tesseract language code).
    pub ocr_lang: String,
    /// OCR page segmentation mode.
    pub ocr_psm: u32,

    // ── LLM ──────────────────────────────────────────────
    /// Vision-capable model id for structured extraction.
    pub llm_model: String,
    /// Sampling temperature. Low — extraction favors determinism.
    pub llm_temperature: f32,
    /// Token budget per extraction call.
    pub llm_max_tokens: u32,
    /// API key for the vision LLM. Image paths fail fast without it.
    pub openai_api_key: Option<String>,

    // ── Resilience ───────────────────────────────────────
    /// Retry attempts for transient LLM failures.
    pub llm_retry_attempts: u32,
    /// Base delay in seconds before the first retry.
    pub llm_retry_delay: f64,
    /// Multiplicative backoff factor between attempts.
    pub llm_retry_backoff: f64,
    /// Whether the LLM response cache is active.
    pub enable_caching: bool,
    /// Cache entry time-to-live in seconds (default 1 hour).
    pub cache_ttl_secs: u64,

    // ── Escalation policy ────────────────────────────────
    /// Missing-field ratio above which a cheap extraction escalates to
    /// the vision LLM. Tunable policy, not a hard law.
    pub completeness_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            max_concurrent_processing: 5,
            max_batch_size: 10,
            pdf_dpi: 300,
            ocr_lang: "por".to_string(),
            ocr_psm: 6,
            llm_model: "gpt-4o".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 2000,
            openai_api_key: None,
            llm_retry_attempts: 3,
            llm_retry_delay: 1.0,
            llm_retry_backoff: 2.0,
            enable_caching: true,
            cache_ttl_secs: 3600,
            completeness_threshold: 0.3,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_file_size: env_parse("MAX_FILE_SIZE", d.max_file_size),
            max_concurrent_processing: env_parse(
                "MAX_CONCURRENT_PROCESSING",
                d.max_concurrent_processing,
            ),
            max_batch_size: env_parse("MAX_BATCH_SIZE", d.max_batch_size),
            pdf_dpi: env_parse("PDF_DPI", d.pdf_dpi),
            ocr_lang: env::var("OCR_LANG").unwrap_or(d.ocr_lang),
            ocr_psm: env_parse("OCR_PSM", d.ocr_psm),
            llm_model: env::var("LLM_MODEL").unwrap_or(d.llm_model),
            llm_temperature: env_parse("LLM_TEMPERATURE", d.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", d.llm_max_tokens),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_retry_attempts: env_parse("LLM_RETRY_ATTEMPTS", d.llm_retry_attempts),
            llm_retry_delay: env_parse("LLM_RETRY_DELAY", d.llm_retry_delay),
            llm_retry_backoff: env_parse("LLM_RETRY_BACKOFF", d.llm_retry_backoff),
            enable_caching: env_parse("ENABLE_CACHING", d.enable_caching),
            cache_ttl_secs: env_parse("CACHE_TTL", d.cache_ttl_secs),
            completeness_threshold: env_parse(
                "COMPLETENESS_THRESHOLD",
                d.completeness_threshold,
            ),
        }
    }

    /// Whether an image-capable extraction path can run at all.
    pub fn has_vision_credentials(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}
