//! Syllabus import orchestration and scheduling analysis.
//!
//! This crate ties extraction, parsing, normalization, and the course store
//! into the preview-then-confirm import workflow, and detects conflicts
//! within a semester.

pub mod conflicts;
pub mod import;
pub mod normalizer;
pub mod overview;
pub mod progress;
pub mod sync;

pub use conflicts::{classify, detect_conflicts};
pub use import::{
    BulkImportResult, ConfirmedImport, FileFailure, ImportCoordinator, ImportFile, ImportState,
    ImportedFile, SyncRequest,
};
pub use normalizer::{NormalizedEvents, event_kind, normalize_events, resolve_date};
pub use overview::{SemesterOverview, semester_overview};
pub use progress::{ProgressReporter, SilentProgress};
pub use sync::{CalendarAdapter, NotesAdapter, SyncError, SyncReport, sync_import};
