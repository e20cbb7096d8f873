//! OCR engine abstraction.
//!
//! The pipeline depends only on [`OcrEngine`]; the Tesseract backend is
//! compiled in behind the `ocr` feature so the default build carries no
//! native dependency. Without the feature, PDF extraction still works
//! wherever an engine is injected (tests use [`MockOcrEngine`]).

use crate::pipeline::ExtractError;

/// Text recognition over one rendered page image.
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an encoded (PNG/JPEG) page image.
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractError>;
}

/// Tesseract-backed engine. Requires the `por` traineddata installed.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    lang: String,
    psm: u32,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(lang: impl Into<String>, psm: u32) -> Self {
        Self {
            lang: lang.into(),
            psm,
        }
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractError> {
        let engine = tesseract::Tesseract::new(None, Some(&self.lang))
            .map_err(|e| ExtractError::OcrProcessing(format!("init: {e}")))?
            .set_variable("tessedit_pageseg_mode", &self.psm.to_string())
            .map_err(|e| ExtractError::OcrProcessing(format!("psm: {e}")))?
            .set_image_from_mem(image)
            .map_err(|e| ExtractError::OcrProcessing(format!("image: {e}")))?;
        let mut engine = engine
            .recognize()
            .map_err(|e| ExtractError::OcrProcessing(format!("recognize: {e}")))?;
        engine
            .get_text()
            .map_err(|e| ExtractError::OcrProcessing(format!("text: {e}")))
    }
}

/// Stand-in engine for builds without the `ocr` feature: every PDF
/// extraction fails with a clear configuration message.
#[cfg(not(feature = "ocr"))]
pub struct DisabledOcr;

#[cfg(not(feature = "ocr"))]
impl OcrEngine for DisabledOcr {
    fn recognize(&self, _image: &[u8]) -> Result<String, ExtractError> {
        Err(ExtractError::OcrProcessing(
            "suporte a OCR não compilado (habilite a feature `ocr`)".into(),
        ))
    }
}

/// Scripted engine for tests: returns queued texts in order, then errors.
pub struct MockOcrEngine {
    pages: std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>,
}

impl MockOcrEngine {
    pub fn new() -> Self {
        Self {
            pages: std::sync::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.pages.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn push_failure(self, message: impl Into<String>) -> Self {
        self.pages.lock().unwrap().push_back(Err(message.into()));
        self
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image: &[u8]) -> Result<String, ExtractError> {
        match self.pages.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ExtractError::OcrProcessing(message)),
            None => Err(ExtractError::OcrProcessing("mock sem páginas".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_pages_in_order_then_errors() {
        let engine = MockOcrEngine::new()
            .push_text("página um")
            .push_failure("falha simulada");
        assert_eq!(engine.recognize(&[]).unwrap(), "página um");
        assert!(matches!(
            engine.recognize(&[]),
            Err(ExtractError::OcrProcessing(_))
        ));
        assert!(engine.recognize(&[]).is_err());
    }
}
