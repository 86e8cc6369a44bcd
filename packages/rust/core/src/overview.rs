//! Semester summary: course and event counts plus upcoming work.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use syllabus_shared::{Event, EventKind, SemesterKey};
use syllabus_storage::SemesterSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct SemesterOverview {
    pub semester: SemesterKey,
    pub total_courses: usize,
    pub exam_count: usize,
    pub assignment_count: usize,
    pub project_count: usize,
    pub completed_count: usize,
    /// Open events dated within the look-ahead window, soonest first.
    pub upcoming: Vec<Event>,
}

/// Summarize a snapshot as of `today`, looking `days` ahead (inclusive). A
/// look-ahead past the calendar's end covers every later event.
pub fn semester_overview(snapshot: &SemesterSnapshot, today: NaiveDate, days: u32) -> SemesterOverview {
    let count = |kind: EventKind| snapshot.events.iter().filter(|e| e.kind == kind).count();
    let horizon = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);

    SemesterOverview {
        semester: snapshot.semester,
        total_courses: snapshot.courses.len(),
        exam_count: count(EventKind::Exam),
        assignment_count: count(EventKind::Assignment),
        project_count: count(EventKind::Project),
        completed_count: snapshot.events.iter().filter(|e| e.completed).count(),
        upcoming: snapshot
            .events
            .iter()
            .filter(|e| !e.completed && e.date >= today && e.date <= horizon)
            .cloned()
            .collect(),
    }
}
