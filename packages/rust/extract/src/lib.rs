//! Document text extraction for syllabus imports.
//!
//! Turns raw document bytes into page text plus layout hints (page breaks,
//! table regions). No semantic interpretation happens here.

pub mod format;
pub mod formats;
pub mod layout;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use syllabus_shared::{Result, SyllabusError};
use tracing::{debug, info, instrument};

pub use format::{DocumentFormat, resolve, sniff};
pub use formats::{ExtractorRegistry, FormatExtractor, RawPage};
pub use layout::{TableRegion, detect_tables, is_tabular_line};

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// Extractor output: page texts in reading order plus detected table regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub format: DocumentFormat,
    pub pages: Vec<ExtractedPage>,
    pub tables: Vec<TableRegion>,
}

impl ExtractedDocument {
    /// Build from plain text (form feeds separate pages). Handy for callers
    /// that already hold text.
    pub fn from_text(text: &str) -> Self {
        let pages = text
            .split('\u{0C}')
            .enumerate()
            .map(|(i, t)| RawPage {
                number: i as u32 + 1,
                text: t.to_string(),
            })
            .collect();
        assemble(DocumentFormat::PlainText, pages)
    }

    /// All page text joined with form feeds.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\u{0C}")
    }

    /// Whether line `line` of page `page` sits inside a detected table.
    pub fn in_table(&self, page: u32, line: usize) -> bool {
        self.tables.iter().any(|t| t.contains(page, line))
    }
}

/// Extraction limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub max_file_bytes: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 25 * 1024 * 1024,
        }
    }
}

impl From<&syllabus_shared::ImportConfig> for ExtractOptions {
    fn from(config: &syllabus_shared::ImportConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
        }
    }
}

/// Dispatches raw bytes to the extractor for their format.
#[derive(Default)]
pub struct DocumentExtractor {
    registry: ExtractorRegistry,
    options: ExtractOptions,
}

impl DocumentExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            registry: ExtractorRegistry::new(),
            options,
        }
    }

    /// Use a custom registry (e.g. with an OCR-backed image extractor).
    pub fn with_registry(registry: ExtractorRegistry, options: ExtractOptions) -> Self {
        Self { registry, options }
    }

    /// Extract text from `bytes`. `hint` is the declared format, if any;
    /// magic bytes take precedence over it.
    #[instrument(skip_all, fields(bytes = bytes.len(), hint = ?hint))]
    pub fn extract(&self, bytes: &[u8], hint: Option<DocumentFormat>) -> Result<ExtractedDocument> {
        let start = Instant::now();

        if bytes.len() as u64 > self.options.max_file_bytes {
            return Err(SyllabusError::unsupported(
                hint.unwrap_or(DocumentFormat::Unknown).as_str(),
                format!(
                    "file is {} bytes, limit is {}",
                    bytes.len(),
                    self.options.max_file_bytes
                ),
            ));
        }

        let format = resolve(bytes, hint);
        let extractor = self.registry.get(format).ok_or_else(|| {
            let reason = match format {
                DocumentFormat::Image => "image documents have no text layer",
                _ => "unrecognised document container",
            };
            SyllabusError::unsupported(format.as_str(), reason)
        })?;
        debug!(%format, extractor = extractor.name(), "extracting");

        let doc = assemble(format, extractor.extract(bytes)?);

        info!(
            %format,
            pages = doc.pages.len(),
            tables = doc.tables.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "document extracted"
        );
        Ok(doc)
    }
}

fn assemble(format: DocumentFormat, raw: Vec<RawPage>) -> ExtractedDocument {
    let tables = raw
        .iter()
        .flat_map(|p| detect_tables(p.number, &p.text))
        .collect();
    let pages = raw
        .into_iter()
        .map(|p| ExtractedPage {
            number: p.number,
            text: p.text,
        })
        .collect();
    ExtractedDocument {
        format,
        pages,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_text_with_tables() {
        let text = "CS 101\nSchedule\n| Week | Date | Topic |\n| 1 | Sep 3 | Intro |\n";
        let doc = DocumentExtractor::default()
            .extract(text.as_bytes(), Some(DocumentFormat::PlainText))
            .unwrap();
        assert_eq!(doc.format, DocumentFormat::PlainText);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.tables.len(), 1);
        assert!(doc.in_table(1, 3));
        assert!(!doc.in_table(1, 0));
    }

    #[test]
    fn image_is_unsupported() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let err = DocumentExtractor::default()
            .extract(&jpeg, Some(DocumentFormat::Pdf))
            .unwrap_err();
        assert_eq!(err.code(), "UnsupportedFormat");
    }

    #[test]
    fn unknown_container_is_unsupported() {
        let err = DocumentExtractor::default()
            .extract(&[0x00, 0x01, 0x02, 0x03], None)
            .unwrap_err();
        assert_eq!(err.code(), "UnsupportedFormat");
    }

    #[test]
    fn oversized_file_is_unsupported() {
        let extractor = DocumentExtractor::new(ExtractOptions { max_file_bytes: 8 });
        let err = extractor
            .extract(b"CS 101 Introduction", None)
            .unwrap_err();
        assert_eq!(err.code(), "UnsupportedFormat");
    }

    #[test]
    fn pdf_dispatch() {
        let bytes = formats::pdf_fixture(&[&["CS 101 Intro"]]);
        let doc = DocumentExtractor::default().extract(&bytes, None).unwrap();
        assert_eq!(doc.format, DocumentFormat::Pdf);
        assert!(doc.full_text().contains("CS 101"));
    }

    #[test]
    fn docx_dispatch_ignores_wrong_hint() {
        let bytes = formats::docx_fixture("<w:p><w:r><w:t>MATH 221</w:t></w:r></w:p>");
        let doc = DocumentExtractor::default()
            .extract(&bytes, Some(DocumentFormat::PlainText))
            .unwrap();
        assert_eq!(doc.format, DocumentFormat::Docx);
        assert_eq!(doc.pages[0].text, "MATH 221\n");
    }

    #[test]
    fn from_text_splits_pages() {
        let doc = ExtractedDocument::from_text("a\x0cb");
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.full_text(), "a\x0cb");
    }
}
