//! Document format detection.
//!
//! Magic bytes win over a declared hint: extensions and upload metadata lie,
//! container signatures do not.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Document container formats the extractor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
    Image,
    Unknown,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = std::convert::Infallible;

    /// Never fails: unrecognised hints map to [`DocumentFormat::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hint = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Ok(match hint.as_str() {
            "pdf" | "application/pdf" => Self::Pdf,
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Self::Docx
            }
            "txt" | "text" | "md" | "markdown" | "text/plain" | "text/markdown" => Self::PlainText,
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "gif" | "image" => Self::Image,
            _ => Self::Unknown,
        })
    }
}

/// Detect the container format from magic bytes.
pub fn sniff(bytes: &[u8]) -> DocumentFormat {
    match bytes {
        [b'%', b'P', b'D', b'F', ..] => DocumentFormat::Pdf,
        [b'P', b'K', 0x03, 0x04, ..] => {
            if contains(bytes, b"word/document.xml") {
                DocumentFormat::Docx
            } else {
                DocumentFormat::Unknown
            }
        }
        [0xFF, 0xD8, 0xFF, ..]
        | [0x89, b'P', b'N', b'G', ..]
        | [b'I', b'I', 0x2A, 0x00, ..]
        | [b'M', b'M', 0x00, 0x2A, ..]
        | [b'G', b'I', b'F', b'8', ..] => DocumentFormat::Image,
        _ if is_likely_text(bytes) => DocumentFormat::PlainText,
        _ => DocumentFormat::Unknown,
    }
}

/// Pick the format to extract with: sniffed bytes first, then the hint.
pub fn resolve(bytes: &[u8], hint: Option<DocumentFormat>) -> DocumentFormat {
    let sniffed = sniff(bytes);
    match hint {
        Some(hint) if sniffed == DocumentFormat::Unknown => hint,
        Some(hint) if hint != sniffed => {
            debug!(%hint, %sniffed, "format hint contradicts content, using sniffed format");
            sniffed
        }
        _ => sniffed,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Valid UTF-8 (a multi-byte char may be cut at the sample boundary) with at
/// least 80% printable characters.
fn is_likely_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = &bytes[..bytes.len().min(4096)];
    let text = match std::str::from_utf8(sample) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
            // Truncated in the middle of a character; the prefix is valid.
            match std::str::from_utf8(&sample[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace() || *c == '\u{0C}')
        .count();
    printable as f64 / total as f64 > 0.80
}
