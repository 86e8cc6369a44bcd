//! Import orchestration: extract → parse → normalize → stage → preview →
//! confirm.
//!
//! Every import moves through [`ImportState`]:
//! `Staged → Previewed → Confirmed → SyncRequested`, or from `Staged` /
//! `Previewed` to `RolledBack`. Calendar and notes sync happen outside the
//! core, after `Confirmed` (see [`crate::sync`]).
//!
//! Staged imports left unconfirmed past `import.staged_ttl_secs` are rolled
//! back on the next preview. Only the newest `import.retained_imports`
//! finished imports stay queryable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use syllabus_extract::{DocumentExtractor, DocumentFormat, ExtractOptions};
use syllabus_parser::{ParseOptions, ParsedSyllabus};
use syllabus_shared::{
    AppConfig, Conflict, ConflictConfig, Course, CourseId, Event, EventId, ImportConfig, ImportId,
    ImportResult, ImportWarning, NormalizerConfig, Result, Semester, SemesterCalendar,
    SemesterKey, SyllabusError, Term, WarningKind, content_hash,
};
use syllabus_storage::CourseStore;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::conflicts::detect_conflicts;
use crate::normalizer::normalize_events;
use crate::overview::{SemesterOverview, semester_overview};
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Staged,
    Previewed,
    Confirmed,
    SyncRequested,
    RolledBack,
}

impl ImportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Previewed => "previewed",
            Self::Confirmed => "confirmed",
            Self::SyncRequested => "sync_requested",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document handed to [`ImportCoordinator::bulk_import`].
#[derive(Debug, Clone)]
pub struct ImportFile {
    /// Display name, usually the file path.
    pub name: String,
    pub bytes: Vec<u8>,
    pub format: Option<DocumentFormat>,
}

/// Result of [`ImportCoordinator::confirm_import`].
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedImport {
    pub import_id: ImportId,
    pub course: Course,
    pub events_created: usize,
    pub events_superseded: usize,
    /// Committed events of the course this import no longer lists.
    pub events_removed: usize,
    /// Conflicts involving this import's events, against the committed set.
    pub conflicts: Vec<Conflict>,
}

/// A confirmed import handed to the external sync collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRequest {
    pub import_id: ImportId,
    pub course: Course,
    pub events: Vec<Event>,
}

/// A file of a bulk import that could not be imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    /// 1-based position in the batch.
    pub file: usize,
    pub name: String,
    /// Taxonomy code, e.g. `UnsupportedFormat`.
    pub error: String,
    pub message: String,
}

/// A file of a bulk import that was committed.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedFile {
    pub file: usize,
    pub name: String,
    pub course_id: CourseId,
    pub course_code: String,
    pub events_created: usize,
    pub conflicts: usize,
}

/// Aggregate bulk import report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkImportResult {
    pub total: usize,
    pub successful: usize,
    pub failed: Vec<FileFailure>,
    /// Files never started because the batch was cancelled.
    pub skipped: usize,
    pub imported: Vec<ImportedFile>,
}

struct Tracked {
    state: ImportState,
    committed: Vec<EventId>,
    course_id: Option<CourseId>,
}

#[derive(Default)]
struct ImportLog {
    tracked: HashMap<ImportId, Tracked>,
    /// Imports in a terminal state, oldest first.
    finished: VecDeque<ImportId>,
}

impl ImportLog {
    /// Move an import to a terminal state, forgetting the oldest finished
    /// imports beyond `retain`.
    fn finish(&mut self, import_id: ImportId, state: ImportState, retain: usize) {
        let Some(tracked) = self.tracked.get_mut(&import_id) else {
            return;
        };
        tracked.state = state;
        tracked.committed = Vec::new();
        self.finished.push_back(import_id);
        while self.finished.len() > retain {
            if let Some(oldest) = self.finished.pop_front() {
                self.tracked.remove(&oldest);
            }
        }
    }
}

/// Extracted and parsed document, with its semester settled.
struct Prepared {
    parsed: ParsedSyllabus,
    semester: Semester,
    source_hash: String,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives documents through the import state machine against one store.
pub struct ImportCoordinator {
    store: Arc<CourseStore>,
    extractor: Arc<DocumentExtractor>,
    calendar: SemesterCalendar,
    conflicts: ConflictConfig,
    normalizer: NormalizerConfig,
    import: ImportConfig,
    imports: Mutex<ImportLog>,
}

impl ImportCoordinator {
    pub fn new(store: Arc<CourseStore>, config: &AppConfig) -> Self {
        Self {
            store,
            extractor: Arc::new(DocumentExtractor::new(ExtractOptions::from(&config.import))),
            calendar: SemesterCalendar::from(config),
            conflicts: config.conflicts,
            normalizer: config.normalizer,
            import: config.import,
            imports: Mutex::new(ImportLog::default()),
        }
    }

    /// Replace the default extractor (e.g. one with extra formats registered).
    pub fn with_extractor(mut self, extractor: DocumentExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn store(&self) -> &CourseStore {
        &self.store
    }

    pub fn calendar(&self) -> &SemesterCalendar {
        &self.calendar
    }

    // -----------------------------------------------------------------------
    // Single-file workflow
    // -----------------------------------------------------------------------

    /// Extract, parse, normalize, and stage a document, returning the
    /// preview. Nothing is committed.
    #[instrument(skip_all, fields(bytes = bytes.len(), semester = ?semester))]
    pub async fn preview_import(
        &self,
        bytes: &[u8],
        format: Option<DocumentFormat>,
        semester: Option<SemesterKey>,
    ) -> Result<ImportResult> {
        let prepared = prepare(&self.extractor, &self.calendar, bytes, format, semester)?;
        self.stage_prepared(prepared).await
    }

    async fn stage_prepared(&self, prepared: Prepared) -> Result<ImportResult> {
        let Prepared {
            parsed,
            semester,
            source_hash,
        } = prepared;

        let now = Utc::now();
        let course = Course {
            id: CourseId::new(),
            code: parsed.course.code,
            name: parsed.course.name,
            semester: semester.key,
            instructor: parsed.course.instructor,
            credits: parsed.course.credits,
            schedule: parsed.course.schedule,
            grading: parsed.course.grading,
            source_hash: Some(source_hash),
            created_at: now,
            updated_at: now,
        };

        let normalized = normalize_events(&parsed.events, &course, &semester, &self.normalizer);
        let mut warnings = parsed.warnings;
        warnings.extend(normalized.warnings);

        self.expire_abandoned().await;
        if let Some(existing) = self.store.find_course(semester.key, &course.code).await {
            if existing.source_hash == course.source_hash {
                warnings.push(ImportWarning::new(
                    WarningKind::AlreadyImported,
                    format!(
                        "{} was already imported into {} from this document",
                        course.code, semester.key
                    ),
                ));
            }
        }

        let import_id = self.store.stage(course, normalized.events).await?;
        self.imports.lock().await.tracked.insert(
            import_id,
            Tracked {
                state: ImportState::Staged,
                committed: Vec::new(),
                course_id: None,
            },
        );

        let preview = match self.store.preview_merge(import_id).await {
            Ok(preview) => preview,
            Err(e) => {
                self.rollback_import(import_id).await?;
                return Err(e);
            }
        };

        for gone in &preview.removed {
            warnings.push(ImportWarning::for_event(
                WarningKind::EventRemoved,
                gone.id,
                format!(
                    "{} on {} is no longer listed and will be removed",
                    gone.title, gone.date
                ),
            ));
        }

        let staged_ids: HashSet<EventId> = preview.staged.iter().map(|e| e.id).collect();
        let conflicts = involving(detect_conflicts(&preview.events, &self.conflicts), &staged_ids);

        self.set_state(import_id, ImportState::Previewed).await;
        info!(
            %import_id,
            course = %preview.course.code,
            semester = %semester.key,
            events = preview.staged.len(),
            removed = preview.removed.len(),
            conflicts = conflicts.len(),
            warnings = warnings.len(),
            "import previewed"
        );

        Ok(ImportResult {
            import_id,
            semester: semester.key,
            course: preview.course,
            events: preview.staged,
            conflicts,
            warnings,
        })
    }

    /// Current state of an import.
    pub async fn import_state(&self, import_id: ImportId) -> Result<ImportState> {
        self.imports
            .lock()
            .await
            .tracked
            .get(&import_id)
            .map(|t| t.state)
            .ok_or_else(|| SyllabusError::not_found(format!("import {import_id}")))
    }

    async fn expect_state(
        &self,
        import_id: ImportId,
        allowed: &[ImportState],
        action: &str,
    ) -> Result<()> {
        let state = self.import_state(import_id).await?;
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(SyllabusError::InvalidState {
                import_id: import_id.to_string(),
                state: state.to_string(),
                action: action.to_string(),
            })
        }
    }

    async fn set_state(&self, import_id: ImportId, state: ImportState) {
        if let Some(tracked) = self.imports.lock().await.tracked.get_mut(&import_id) {
            tracked.state = state;
        }
    }

    async fn finish(&self, import_id: ImportId, state: ImportState) {
        self.imports
            .lock()
            .await
            .finish(import_id, state, self.import.retained_imports);
    }

    /// Roll back staged imports older than `import.staged_ttl_secs`.
    async fn expire_abandoned(&self) {
        let ttl = Duration::from_secs(self.import.staged_ttl_secs);
        let expired = self.store.expire_staged(ttl).await;
        if expired.is_empty() {
            return;
        }
        let mut imports = self.imports.lock().await;
        for import_id in expired {
            debug!(%import_id, "abandoned import rolled back");
            imports.finish(import_id, ImportState::RolledBack, self.import.retained_imports);
        }
    }

    /// Commit a previewed import. Conflicts never block the commit.
    #[instrument(skip_all, fields(import_id = %import_id))]
    pub async fn confirm_import(&self, import_id: ImportId) -> Result<ConfirmedImport> {
        self.expect_state(
            import_id,
            &[ImportState::Staged, ImportState::Previewed],
            "confirm",
        )
        .await?;

        let outcome = self.store.commit(import_id).await?;
        let ids: HashSet<EventId> = outcome.events.iter().map(|e| e.id).collect();
        let snapshot = self.store.semester_events(outcome.course.semester).await;
        let conflicts = involving(detect_conflicts(&snapshot.events, &self.conflicts), &ids);

        if let Some(tracked) = self.imports.lock().await.tracked.get_mut(&import_id) {
            tracked.state = ImportState::Confirmed;
            tracked.course_id = Some(outcome.course.id);
            tracked.committed = outcome.events.iter().map(|e| e.id).collect();
        }

        info!(
            course = %outcome.course.code,
            created = outcome.events_created,
            superseded = outcome.events_superseded,
            removed = outcome.events_removed,
            conflicts = conflicts.len(),
            "import confirmed"
        );
        Ok(ConfirmedImport {
            import_id,
            course: outcome.course,
            events_created: outcome.events_created,
            events_superseded: outcome.events_superseded,
            events_removed: outcome.events_removed,
            conflicts,
        })
    }

    /// Discard a staged or previewed import.
    pub async fn rollback_import(&self, import_id: ImportId) -> Result<()> {
        self.expect_state(
            import_id,
            &[ImportState::Staged, ImportState::Previewed],
            "roll back",
        )
        .await?;
        self.store.rollback(import_id).await?;
        self.finish(import_id, ImportState::RolledBack).await;
        debug!(%import_id, "import rolled back");
        Ok(())
    }

    /// Mark a confirmed import as handed to sync and return what to sync.
    pub async fn request_sync(&self, import_id: ImportId) -> Result<SyncRequest> {
        self.expect_state(import_id, &[ImportState::Confirmed], "request sync")
            .await?;

        let (course_id, committed) = {
            let imports = self.imports.lock().await;
            let tracked = imports
                .tracked
                .get(&import_id)
                .ok_or_else(|| SyllabusError::not_found(format!("import {import_id}")))?;
            let course_id = tracked
                .course_id
                .ok_or_else(|| SyllabusError::not_found(format!("course of import {import_id}")))?;
            (course_id, tracked.committed.clone())
        };

        let course = self.store.get_course(course_id).await?;
        let committed: HashSet<EventId> = committed.into_iter().collect();
        let events = self
            .store
            .course_events(course_id)
            .await?
            .into_iter()
            .filter(|e| committed.contains(&e.id))
            .collect();

        self.finish(import_id, ImportState::SyncRequested).await;
        Ok(SyncRequest {
            import_id,
            course,
            events,
        })
    }

    // -----------------------------------------------------------------------
    // Bulk import
    // -----------------------------------------------------------------------

    /// Import many files, each independently: one file failing never aborts
    /// the batch. Extraction and parsing run on blocking workers bounded by
    /// `import.concurrency`; commits happen in file order. Cancelling `cancel`
    /// stops files that have not started; committed files stay committed.
    #[instrument(skip_all, fields(files = files.len(), semester = ?semester))]
    pub async fn bulk_import(
        &self,
        files: Vec<ImportFile>,
        semester: Option<SemesterKey>,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> BulkImportResult {
        let start = Instant::now();
        let total = files.len();
        let semaphore = Arc::new(Semaphore::new(self.import.concurrency.max(1) as usize));

        progress.phase("Extracting and parsing");
        let mut names = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for file in files {
            names.push(file.name.clone());
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let extractor = Arc::clone(&self.extractor);
            let calendar = self.calendar.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let ImportFile { bytes, format, .. } = file;
                let joined = tokio::task::spawn_blocking(move || {
                    prepare(&extractor, &calendar, &bytes, format, semester)
                })
                .await;
                Some(joined.unwrap_or_else(|e| {
                    Err(SyllabusError::Extraction(format!("worker failed: {e}")))
                }))
            }));
        }

        progress.phase("Committing");
        let mut result = BulkImportResult {
            total,
            ..Default::default()
        };
        for (index, (handle, name)) in handles.into_iter().zip(names).enumerate() {
            let file = index + 1;
            let prepared = match handle.await {
                Ok(Some(prepared)) => prepared,
                Ok(None) => Err(SyllabusError::Cancelled),
                Err(e) => Err(SyllabusError::Extraction(format!("worker failed: {e}"))),
            };
            let prepared = match prepared {
                Ok(_) if cancel.is_cancelled() => Err(SyllabusError::Cancelled),
                other => other,
            };
            if let Err(SyllabusError::Cancelled) = prepared {
                progress.file_finished(&name, file, total, Some(&SyllabusError::Cancelled));
                result.skipped += 1;
                continue;
            }

            let outcome = match prepared {
                Ok(prepared) => self.import_prepared(prepared).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(confirmed) => {
                    progress.file_finished(&name, file, total, None);
                    result.successful += 1;
                    result.imported.push(ImportedFile {
                        file,
                        name,
                        course_id: confirmed.course.id,
                        course_code: confirmed.course.code,
                        events_created: confirmed.events_created,
                        conflicts: confirmed.conflicts.len(),
                    });
                }
                Err(e) => {
                    if e.is_per_file() {
                        warn!(file, name = %name, error = %e, "file failed");
                    } else {
                        error!(file, name = %name, error = %e, "file failed");
                    }
                    progress.file_finished(&name, file, total, Some(&e));
                    result.failed.push(FileFailure {
                        file,
                        name,
                        error: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            total,
            successful = result.successful,
            failed = result.failed.len(),
            skipped = result.skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "bulk import finished"
        );
        progress.done(&result);
        result
    }

    /// Stage and immediately confirm; a failed confirm rolls the stage back.
    /// Bulk results carry no import id, so confirmed imports are not tracked.
    async fn import_prepared(&self, prepared: Prepared) -> Result<ConfirmedImport> {
        let preview = self.stage_prepared(prepared).await?;
        match self.confirm_import(preview.import_id).await {
            Ok(confirmed) => {
                self.imports.lock().await.tracked.remove(&preview.import_id);
                Ok(confirmed)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback_import(preview.import_id).await {
                    warn!(import_id = %preview.import_id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries and updates over committed state
    // -----------------------------------------------------------------------

    pub async fn list_courses(&self, semester: SemesterKey) -> Vec<Course> {
        self.store.list_courses(semester).await
    }

    pub async fn semester_overview(
        &self,
        semester: SemesterKey,
        today: NaiveDate,
        days: u32,
    ) -> SemesterOverview {
        let snapshot = self.store.semester_events(semester).await;
        semester_overview(&snapshot, today, days)
    }

    pub async fn mark_event_complete(&self, course_id: CourseId, event_id: EventId) -> Result<Event> {
        self.store.mark_event_complete(course_id, event_id).await
    }

    /// All conflicts among a semester's committed events.
    pub async fn detect_conflicts(&self, semester: SemesterKey) -> Vec<Conflict> {
        let snapshot = self.store.semester_events(semester).await;
        detect_conflicts(&snapshot.events, &self.conflicts)
    }
}

fn involving(conflicts: Vec<Conflict>, ids: &HashSet<EventId>) -> Vec<Conflict> {
    conflicts
        .into_iter()
        .filter(|c| ids.contains(&c.first.event_id) || ids.contains(&c.second.event_id))
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction + parsing (blocking, stateless)
// ---------------------------------------------------------------------------

fn prepare(
    extractor: &DocumentExtractor,
    calendar: &SemesterCalendar,
    bytes: &[u8],
    format: Option<DocumentFormat>,
    semester: Option<SemesterKey>,
) -> Result<Prepared> {
    let doc = extractor.extract(bytes, format)?;
    let options = ParseOptions {
        semester_hint: semester.map(|key| calendar.resolve(key)),
        reference_year: Some(Utc::now().year()),
    };
    let parsed = syllabus_parser::parse(&doc, &options)?;
    let key = match semester {
        Some(key) => key,
        None => infer_semester(&parsed)?,
    };
    Ok(Prepared {
        parsed,
        semester: calendar.resolve(key),
        source_hash: content_hash(bytes),
    })
}

/// The document's own label, else the term and year most event dates fall in.
fn infer_semester(parsed: &ParsedSyllabus) -> Result<SemesterKey> {
    if let Some(key) = parsed.detected_semester {
        return Ok(key);
    }
    let mut counts: HashMap<SemesterKey, usize> = HashMap::new();
    for date in parsed.events.iter().filter_map(|e| e.date.absolute()) {
        *counts
            .entry(SemesterKey::new(Term::from_month(date.month()), date.year()))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(key, _)| key)
        .ok_or_else(|| {
            SyllabusError::validation(format!(
                "could not determine the semester of {}; pass one explicitly",
                parsed.course.code
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;

    const CS101: &str = "\
CS 101: Introduction to Programming
Fall 2025
Instructor: Dr. Ada Lovelace

Grading
Homework 40%
Exams 60%

Schedule
Homework 1 due Sep 12
Midterm Exam: October 14, 10:00-11:00 AM
Final Exam: December 15
";

    const MATH221: &str = "\
MATH 221: Linear Algebra
Fall 2025

Midterm: Oct 14, 10:30am-11:30am
Problem set 3 due Nov 3
";

    fn fall() -> SemesterKey {
        SemesterKey::new(Term::Fall, 2025)
    }

    fn coordinator() -> ImportCoordinator {
        ImportCoordinator::new(Arc::new(CourseStore::in_memory()), &AppConfig::default())
    }

    #[tokio::test]
    async fn preview_then_confirm() {
        let coordinator = coordinator();
        let preview = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        assert_eq!(preview.course.code, "CS 101");
        assert_eq!(preview.events.len(), 3);
        assert_eq!(
            coordinator.import_state(preview.import_id).await.unwrap(),
            ImportState::Previewed
        );
        assert!(coordinator.list_courses(fall()).await.is_empty());

        let confirmed = coordinator.confirm_import(preview.import_id).await.unwrap();
        assert_eq!(confirmed.events_created, 3);
        assert_eq!(coordinator.list_courses(fall()).await.len(), 1);
        assert_eq!(
            coordinator.import_state(preview.import_id).await.unwrap(),
            ImportState::Confirmed
        );
    }

    #[tokio::test]
    async fn preview_reports_conflicts_with_committed_courses() {
        let coordinator = coordinator();
        let first = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        coordinator.confirm_import(first.import_id).await.unwrap();

        let second = coordinator
            .preview_import(MATH221.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        let critical: Vec<_> = second
            .conflicts
            .iter()
            .filter(|c| c.severity == syllabus_shared::Severity::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].first.course_code, "CS 101");
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        let coordinator = coordinator();
        let preview = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        coordinator.confirm_import(preview.import_id).await.unwrap();

        let err = coordinator.confirm_import(preview.import_id).await.unwrap_err();
        assert!(matches!(err, SyllabusError::InvalidState { .. }));
        let err = coordinator.rollback_import(preview.import_id).await.unwrap_err();
        assert!(matches!(err, SyllabusError::InvalidState { .. }));

        let request = coordinator.request_sync(preview.import_id).await.unwrap();
        assert_eq!(request.events.len(), 3);
        assert_eq!(
            coordinator.import_state(preview.import_id).await.unwrap(),
            ImportState::SyncRequested
        );
        assert!(coordinator.request_sync(preview.import_id).await.is_err());
    }

    #[tokio::test]
    async fn rollback_discards_staged_import() {
        let coordinator = coordinator();
        let preview = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        coordinator.rollback_import(preview.import_id).await.unwrap();
        assert!(coordinator.list_courses(fall()).await.is_empty());
        let err = coordinator.confirm_import(preview.import_id).await.unwrap_err();
        assert!(matches!(err, SyllabusError::InvalidState { .. }));
        assert!(matches!(
            coordinator.import_state(ImportId::new()).await,
            Err(SyllabusError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reimport_warns_and_stays_idempotent() {
        let coordinator = coordinator();
        for _ in 0..2 {
            let preview = coordinator
                .preview_import(CS101.as_bytes(), None, Some(fall()))
                .await
                .unwrap();
            coordinator.confirm_import(preview.import_id).await.unwrap();
        }
        let preview = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        assert!(
            preview
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::AlreadyImported)
        );
        let snapshot = coordinator.store().semester_events(fall()).await;
        assert_eq!(snapshot.courses.len(), 1);
        assert_eq!(snapshot.events.len(), 3);
    }

    #[tokio::test]
    async fn reimport_removes_events_no_longer_listed() {
        let coordinator = coordinator();
        let first = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        coordinator.confirm_import(first.import_id).await.unwrap();

        let revised = CS101.replace("Final Exam: December 15\n", "");
        let preview = coordinator
            .preview_import(revised.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        let removed: Vec<_> = preview
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::EventRemoved)
            .collect();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].message.contains("Final Exam"));

        let confirmed = coordinator.confirm_import(preview.import_id).await.unwrap();
        assert_eq!(confirmed.events_superseded, 2);
        assert_eq!(confirmed.events_removed, 1);
        let snapshot = coordinator.store().semester_events(fall()).await;
        assert_eq!(snapshot.events.len(), 2);
    }

    #[tokio::test]
    async fn finished_imports_beyond_retention_are_forgotten() {
        let mut config = AppConfig::default();
        config.import.retained_imports = 1;
        let coordinator =
            ImportCoordinator::new(Arc::new(CourseStore::in_memory()), &config);

        let mut ids = Vec::new();
        for _ in 0..2 {
            let preview = coordinator
                .preview_import(CS101.as_bytes(), None, Some(fall()))
                .await
                .unwrap();
            coordinator.rollback_import(preview.import_id).await.unwrap();
            ids.push(preview.import_id);
        }

        assert!(matches!(
            coordinator.import_state(ids[0]).await,
            Err(SyllabusError::NotFound { .. })
        ));
        assert_eq!(
            coordinator.import_state(ids[1]).await.unwrap(),
            ImportState::RolledBack
        );
        assert_eq!(coordinator.imports.lock().await.tracked.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_previews_expire_on_next_preview() {
        let mut config = AppConfig::default();
        config.import.staged_ttl_secs = 0;
        let coordinator =
            ImportCoordinator::new(Arc::new(CourseStore::in_memory()), &config);

        let abandoned = coordinator
            .preview_import(CS101.as_bytes(), None, Some(fall()))
            .await
            .unwrap();
        let current = coordinator
            .preview_import(MATH221.as_bytes(), None, Some(fall()))
            .await
            .unwrap();

        assert_eq!(
            coordinator.import_state(abandoned.import_id).await.unwrap(),
            ImportState::RolledBack
        );
        let err = coordinator
            .confirm_import(abandoned.import_id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::InvalidState { .. }));
        assert!(coordinator.store().staged(abandoned.import_id).await.is_err());

        coordinator.confirm_import(current.import_id).await.unwrap();
        assert_eq!(coordinator.list_courses(fall()).await.len(), 1);
    }

    #[tokio::test]
    async fn bulk_import_leaves_no_tracked_imports() {
        let coordinator = coordinator();
        let files = [CS101, MATH221]
            .into_iter()
            .enumerate()
            .map(|(i, text)| ImportFile {
                name: format!("file{i}.txt"),
                bytes: text.as_bytes().to_vec(),
                format: None,
            })
            .collect();
        let result = coordinator
            .bulk_import(files, Some(fall()), &CancellationToken::new(), &SilentProgress)
            .await;
        assert_eq!(result.successful, 2);
        assert!(coordinator.imports.lock().await.tracked.is_empty());
    }

    #[tokio::test]
    async fn semester_is_inferred_from_the_document() {
        let coordinator = coordinator();
        let preview = coordinator
            .preview_import(MATH221.as_bytes(), None, None)
            .await
            .unwrap();
        assert_eq!(preview.semester, fall());

        let unlabelled = "PHYS 150: Mechanics\nQuiz 1 on 2026-02-03\nQuiz 2 on 2026-03-03\n";
        let preview = coordinator
            .preview_import(unlabelled.as_bytes(), None, None)
            .await
            .unwrap();
        assert_eq!(preview.semester, SemesterKey::new(Term::Spring, 2026));

        let err = coordinator
            .preview_import(b"PHYS 150: Mechanics\nNo dates here.\n", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::Validation { .. }));
    }

    #[tokio::test]
    async fn bulk_import_honours_cancellation() {
        let coordinator = coordinator();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let files = vec![ImportFile {
            name: "cs101.txt".into(),
            bytes: CS101.as_bytes().to_vec(),
            format: None,
        }];
        let result = coordinator
            .bulk_import(files, Some(fall()), &cancel, &SilentProgress)
            .await;
        assert_eq!(result.total, 1);
        assert_eq!(result.successful, 0);
        assert_eq!(result.skipped, 1);
        assert!(coordinator.list_courses(fall()).await.is_empty());
    }
}
