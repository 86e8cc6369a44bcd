//! Per-format text extractors and the registry that dispatches to them.

mod docx;
mod pdf;
mod text;

use syllabus_shared::Result;

use crate::format::DocumentFormat;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use text::PlainTextExtractor;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Raw text of one page, before layout analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// Text extraction for a single container format.
pub trait FormatExtractor: Send + Sync {
    /// The format this extractor handles.
    fn format(&self) -> DocumentFormat;

    /// Extract page text in reading order.
    fn extract(&self, bytes: &[u8]) -> Result<Vec<RawPage>>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered extractors. Later registrations for a format take
/// precedence over earlier ones.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FormatExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with the built-in PDF, DOCX and plain-text extractors.
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(PdfExtractor),
                Box::new(DocxExtractor),
                Box::new(PlainTextExtractor),
            ],
        }
    }

    /// Register an additional extractor, overriding any existing one for its format.
    pub fn register(&mut self, extractor: Box<dyn FormatExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find the extractor for `format`, if any.
    pub fn get(&self, format: DocumentFormat) -> Option<&dyn FormatExtractor> {
        self.extractors
            .iter()
            .rev()
            .find(|e| e.format() == format)
            .map(|e| e.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
pub(crate) use docx::tests::build_docx as docx_fixture;
#[cfg(test)]
pub(crate) use pdf::tests::build_pdf as pdf_fixture;
