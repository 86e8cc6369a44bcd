//! Progress reporting for bulk imports.

use syllabus_shared::SyllabusError;

use crate::import::BulkImportResult;

/// Progress callback for reporting bulk import status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a file has been extracted, parsed, and committed, or has
    /// failed.
    fn file_finished(&self, name: &str, current: usize, total: usize, error: Option<&SyllabusError>);
    /// Called once the batch completes.
    fn done(&self, result: &BulkImportResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_finished(
        &self,
        _name: &str,
        _current: usize,
        _total: usize,
        _error: Option<&SyllabusError>,
    ) {
    }
    fn done(&self, _result: &BulkImportResult) {}
}
