use lopdf::Document;
use syllabus_shared::{Result, SyllabusError};
use tracing::debug;

use super::{FormatExtractor, RawPage};
use crate::format::DocumentFormat;

/// Text-layer PDFs via `lopdf`. Scanned and encrypted PDFs are rejected.
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<RawPage>> {
        let doc = Document::load_mem(bytes).map_err(|e| {
            let msg = e.to_string();
            let lower = msg.to_lowercase();
            if lower.contains("encrypt") || lower.contains("password") {
                SyllabusError::unsupported("pdf", "document is encrypted")
            } else {
                SyllabusError::Extraction(format!("failed to load PDF: {msg}"))
            }
        })?;

        if doc.is_encrypted() {
            return Err(SyllabusError::unsupported("pdf", "document is encrypted"));
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(SyllabusError::Extraction("PDF has no pages".into()));
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let text = doc.extract_text(&[number]).map_err(|e| {
                SyllabusError::Extraction(format!("page {number}: {e}"))
            })?;
            pages.push(RawPage { number, text });
        }

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            debug!(pages = pages.len(), "pdf has no text layer");
            return Err(SyllabusError::unsupported(
                "pdf",
                "no text layer (scanned image?)",
            ));
        }

        Ok(pages)
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
