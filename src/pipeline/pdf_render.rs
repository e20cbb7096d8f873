//! PDF page rendering behind a trait seam.
//!
//! Scanned fiscal PDFs have no usable text layer, so the PDF path
//! rasterizes pages and hands them to OCR (and, on escalation, to the
//! vision model). Production rendering goes through pdfium; tests inject
//! [`MockPdfRenderer`].

use std::io::Cursor;

use pdfium_render::prelude::*;

use crate::pipeline::ExtractError;

/// Rasterization of single PDF pages to encoded PNG.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ExtractError>;

    /// Render one page (0-based) at the given DPI as PNG bytes.
    fn render_page(&self, pdf: &[u8], index: usize, dpi: u32) -> Result<Vec<u8>, ExtractError>;
}

/// pdfium-backed renderer. Binds the system pdfium library per call;
/// the `thread_safe` crate feature serializes access internally.
pub struct PdfiumRenderer;

fn load_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| ExtractError::PdfRendering(format!("pdfium indisponível: {e}")))?;
    Ok(Pdfium::new(bindings))
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ExtractError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ExtractError::PdfRendering(format!("PDF inválido: {e}")))?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(&self, pdf: &[u8], index: usize, dpi: u32) -> Result<Vec<u8>, ExtractError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ExtractError::PdfRendering(format!("PDF inválido: {e}")))?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| ExtractError::PdfRendering(format!("página {index}: {e}")))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
        let image = page
            .render_with_config(&config)
            .map_err(|e| ExtractError::PdfRendering(format!("render página {index}: {e}")))?
            .as_image();
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| ExtractError::PdfRendering(format!("codificação PNG: {e}")))?;
        Ok(out)
    }
}

/// Fixed-page renderer for tests: N pages, each rendering to a small
/// marker payload the mock OCR engine can ignore.
pub struct MockPdfRenderer {
    pages: usize,
}

impl MockPdfRenderer {
    pub fn new(pages: usize) -> Self {
        Self { pages }
    }
}

impl PdfPageRenderer for MockPdfRenderer {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, ExtractError> {
        Ok(self.pages)
    }

    fn render_page(&self, _pdf: &[u8], index: usize, _dpi: u32) -> Result<Vec<u8>, ExtractError> {
        if index >= self.pages {
            return Err(ExtractError::PdfRendering(format!(
                "página {index} fora do intervalo"
            )));
        }
        Ok(format!("pagina-{index}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_renders_only_existing_pages() {
        let renderer = MockPdfRenderer::new(2);
        assert_eq!(renderer.page_count(&[]).unwrap(), 2);
        assert_eq!(renderer.render_page(&[], 0, 300).unwrap(), b"pagina-0");
        assert_eq!(renderer.render_page(&[], 1, 300).unwrap(), b"pagina-1");
        assert!(matches!(
            renderer.render_page(&[], 2, 300),
            Err(ExtractError::PdfRendering(_))
        ));
    }
}
