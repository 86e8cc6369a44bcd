//! Error types for syllabus imports.
//!
//! Library crates use [`SyllabusError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Every store mutation that returns an error leaves the store unchanged.
//! Partial application only exists at batch level (bulk import, sync) and is
//! reported there explicitly, never through this type.

use std::path::PathBuf;

use chrono::NaiveDate;

/// Top-level error type for all syllabus operations.
#[derive(Debug, thiserror::Error)]
pub enum SyllabusError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The document container is encrypted, image-only, or unknown.
    #[error("unsupported format ({format}): {reason}")]
    UnsupportedFormat { format: String, reason: String },

    /// The document stream is corrupt or could not be read.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// No course identity could be recovered from the document.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (bad semester label, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A course, event, or import does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Two staged events collapse onto the same (date, time, kind) key.
    #[error("duplicate event {event_id} ({title}) on {date}")]
    DuplicateEvent {
        event_id: String,
        title: String,
        date: NaiveDate,
    },

    /// An import was asked to move through an invalid state transition.
    #[error("import {import_id} is {state}; cannot {action}")]
    InvalidState {
        import_id: String,
        state: String,
        action: String,
    },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A bulk import was cancelled before this file started.
    #[error("cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SyllabusError>;

impl SyllabusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an unsupported-format error.
    pub fn unsupported(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable taxonomy name, used in per-file bulk import failures.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::UnsupportedFormat { .. } => "UnsupportedFormat",
            Self::Extraction(_) => "ExtractionError",
            Self::Parse { .. } => "ParseError",
            Self::Validation { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFound",
            Self::DuplicateEvent { .. } => "DuplicateEvent",
            Self::InvalidState { .. } => "InvalidState",
            Self::Storage(_) => "StorageError",
            Self::Io { .. } => "IoError",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the failure is confined to a single file of a bulk import.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::Extraction(_) | Self::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SyllabusError::config("missing data_dir");
        assert_eq!(err.to_string(), "config error: missing data_dir");

        let err = SyllabusError::unsupported("image", "scanned image without text layer");
        assert!(err.to_string().contains("scanned image"));
    }

    #[test]
    fn taxonomy_codes() {
        assert_eq!(
            SyllabusError::unsupported("image", "x").code(),
            "UnsupportedFormat"
        );
        assert_eq!(SyllabusError::Extraction("bad xref".into()).code(), "ExtractionError");
        assert_eq!(SyllabusError::parse("no course code").code(), "ParseError");
        assert_eq!(SyllabusError::not_found("event").code(), "NotFound");
    }

    #[test]
    fn per_file_classification() {
        assert!(SyllabusError::parse("x").is_per_file());
        assert!(SyllabusError::Extraction("x".into()).is_per_file());
        assert!(!SyllabusError::Storage("locked".into()).is_per_file());
    }
}
