use syllabus_shared::{Result, SyllabusError};

use super::{FormatExtractor, RawPage};
use crate::format::DocumentFormat;

/// Plain text and markdown. Form feeds separate pages.
pub struct PlainTextExtractor;

impl FormatExtractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<RawPage>> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SyllabusError::Extraction(format!("invalid UTF-8: {e}")))?;
        let text = text.replace("\r\n", "\n").replace('\r', "\n");

        Ok(text
            .split('\u{0C}')
            .enumerate()
            .map(|(i, page)| RawPage {
                number: i as u32 + 1,
                text: page.to_string(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "text"
    }
}
