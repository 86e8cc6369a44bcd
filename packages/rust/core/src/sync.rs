//! Interfaces to the external calendar and notes collaborators.
//!
//! The core never calls these itself. A caller that confirmed an import asks
//! [`crate::ImportCoordinator::request_sync`] for a [`SyncRequest`] and hands
//! it to [`sync_import`]. Sync failures are reported, never rolled back into
//! the store.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use syllabus_shared::{Course, Event, EventId};
use tracing::{info, instrument, warn};

use crate::import::SyncRequest;

/// External calendar or notes failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("calendar adapter failed: {message}")]
    Calendar { message: String, retryable: bool },

    #[error("notes adapter failed: {message}")]
    Notes { message: String, retryable: bool },

    #[error("sync call timed out after {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    /// Whether retrying the same call may succeed.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Calendar { retryable, .. } | Self::Notes { retryable, .. } => *retryable,
            Self::Timeout(_) => true,
        }
    }
}

/// Creates calendar entries for committed events.
#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    /// Returns the external calendar event id.
    async fn create_event(&self, course: &Course, event: &Event) -> Result<String, SyncError>;
}

/// Writes course notes for a committed course.
#[async_trait]
pub trait NotesAdapter: Send + Sync {
    async fn write_course(&self, course: &Course, events: &[Event]) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncedEvent {
    pub event_id: EventId,
    pub external_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    /// `None` for the notes call.
    pub event_id: Option<EventId>,
    pub message: String,
    pub retryable: bool,
}

impl SyncFailure {
    fn new(event_id: Option<EventId>, error: &SyncError) -> Self {
        Self {
            event_id,
            message: error.to_string(),
            retryable: error.retryable(),
        }
    }
}

/// What a sync run achieved; partial success is normal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub created: Vec<SyncedEvent>,
    pub failed: Vec<SyncFailure>,
    pub notes_written: bool,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.notes_written
    }

    /// Failures worth trying again.
    pub fn retryable(&self) -> impl Iterator<Item = &SyncFailure> {
        self.failed.iter().filter(|f| f.retryable)
    }
}

/// Push a confirmed import through both adapters, bounding every call by
/// `timeout`.
#[instrument(skip_all, fields(import_id = %request.import_id, course = %request.course.code))]
pub async fn sync_import(
    request: &SyncRequest,
    calendar: &dyn CalendarAdapter,
    notes: &dyn NotesAdapter,
    timeout: Duration,
) -> SyncReport {
    let mut report = SyncReport::default();

    for event in &request.events {
        let outcome = tokio::time::timeout(timeout, calendar.create_event(&request.course, event))
            .await
            .unwrap_or(Err(SyncError::Timeout(timeout)));
        match outcome {
            Ok(external_id) => report.created.push(SyncedEvent {
                event_id: event.id,
                external_id,
            }),
            Err(e) => {
                warn!(event = %event.title, error = %e, "calendar sync failed");
                report.failed.push(SyncFailure::new(Some(event.id), &e));
            }
        }
    }

    let outcome = tokio::time::timeout(timeout, notes.write_course(&request.course, &request.events))
        .await
        .unwrap_or(Err(SyncError::Timeout(timeout)));
    match outcome {
        Ok(()) => report.notes_written = true,
        Err(e) => {
            warn!(error = %e, "notes sync failed");
            report.failed.push(SyncFailure::new(None, &e));
        }
    }

    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        notes = report.notes_written,
        "sync finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use syllabus_shared::{CourseId, EventKind, ImportId, SemesterKey, Term};

    struct FlakyCalendar;

    #[async_trait]
    impl CalendarAdapter for FlakyCalendar {
        async fn create_event(&self, _course: &Course, event: &Event) -> Result<String, SyncError> {
            match event.kind {
                EventKind::Exam => Ok(format!("cal-{}", event.title)),
                EventKind::Project => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok("late".into())
                }
                _ => Err(SyncError::Calendar {
                    message: "quota exceeded".into(),
                    retryable: true,
                }),
            }
        }
    }

    struct BrokenNotes;

    #[async_trait]
    impl NotesAdapter for BrokenNotes {
        async fn write_course(&self, _course: &Course, _events: &[Event]) -> Result<(), SyncError> {
            Err(SyncError::Notes {
                message: "vault is read-only".into(),
                retryable: false,
            })
        }
    }

    fn request() -> SyncRequest {
        let now = Utc::now();
        let course = Course {
            id: CourseId::new(),
            code: "CS 101".into(),
            name: "Intro".into(),
            semester: SemesterKey::new(Term::Fall, 2025),
            instructor: None,
            credits: None,
            schedule: vec![],
            grading: vec![],
            source_hash: None,
            created_at: now,
            updated_at: now,
        };
        let event = |kind: EventKind, title: &str| Event {
            id: EventId::new(),
            course_id: course.id,
            course_code: course.code.clone(),
            kind,
            title: title.into(),
            date: NaiveDate::from_ymd_opt(2025, 10, 14).unwrap(),
            time: None,
            confidence: 0.9,
            completed: false,
            outside_semester: false,
        };
        let events = vec![
            event(EventKind::Exam, "Midterm"),
            event(EventKind::Assignment, "Homework 1"),
            event(EventKind::Project, "Project"),
        ];
        SyncRequest {
            import_id: ImportId::new(),
            course,
            events,
        }
    }

    #[tokio::test]
    async fn partial_sync_is_reported() {
        let request = request();
        let report = sync_import(
            &request,
            &FlakyCalendar,
            &BrokenNotes,
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].external_id, "cal-Midterm");
        assert_eq!(report.failed.len(), 3);
        assert!(!report.notes_written);
        assert!(!report.is_complete());
        // Quota and timeout failures can be retried; the read-only vault cannot.
        assert_eq!(report.retryable().count(), 2);
        assert!(report.failed[1].message.contains("timed out"));
    }
}
