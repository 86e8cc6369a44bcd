//! Core domain types for courses, events, semesters, and conflicts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::SyllabusError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a committed course.
    CourseId
);
uuid_id!(
    /// Identifier of an event (stable across re-imports that supersede it).
    EventId
);
uuid_id!(
    /// Identifier of a staged import transaction.
    ImportId
);

// ---------------------------------------------------------------------------
// Semester
// ---------------------------------------------------------------------------

/// Academic term within a year, in calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }

    /// Built-in academic window for this term, used when no explicit
    /// `[[semesters]]` entry is configured.
    pub fn default_window(&self, year: i32) -> (NaiveDate, NaiveDate) {
        let (start, end) = match self {
            Self::Winter => ((1, 3), (3, 22)),
            Self::Spring => ((1, 8), (5, 15)),
            Self::Summer => ((5, 20), (8, 15)),
            Self::Fall => ((8, 20), (12, 20)),
        };
        (ymd(year, start.0, start.1), ymd(year, end.0, end.1))
    }

    /// Term that most plausibly contains dates in `month` (1-12).
    pub fn from_month(month: u32) -> Self {
        match month {
            1..=5 => Self::Spring,
            6 | 7 => Self::Summer,
            _ => Self::Fall,
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Term {
    type Err = SyllabusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "winter" => Ok(Self::Winter),
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" | "autumn" => Ok(Self::Fall),
            other => Err(SyllabusError::validation(format!("unknown term '{other}'"))),
        }
    }
}

/// Logical grouping key of a semester: term label plus year.
///
/// Two different keys never share conflict scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemesterKey {
    pub term: Term,
    pub year: i32,
}

impl SemesterKey {
    pub fn new(term: Term, year: i32) -> Self {
        Self { term, year }
    }
}

impl PartialOrd for SemesterKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemesterKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.year, self.term).cmp(&(other.year, other.term))
    }
}

impl fmt::Display for SemesterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term, self.year)
    }
}

impl FromStr for SemesterKey {
    type Err = SyllabusError;

    /// Accepts `Fall 2025`, `fall-2025`, `2025 Fall`, and `Fall Semester 2025`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut term = None;
        let mut year = None;
        for token in s
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '/')
            .filter(|t| !t.is_empty())
        {
            if let Ok(y) = token.parse::<i32>() {
                year = Some(y);
            } else if let Ok(t) = token.parse::<Term>() {
                term = Some(t);
            } else if !token.eq_ignore_ascii_case("semester") && !token.eq_ignore_ascii_case("term")
            {
                return Err(SyllabusError::validation(format!(
                    "invalid semester '{s}': unexpected '{token}'"
                )));
            }
        }
        match (term, year) {
            (Some(term), Some(year)) if (1900..=2200).contains(&year) => Ok(Self { term, year }),
            _ => Err(SyllabusError::validation(format!(
                "invalid semester '{s}': expected e.g. 'Fall 2025'"
            ))),
        }
    }
}

/// A semester resolved to its academic date window (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub key: SemesterKey,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Semester {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

/// Course instructor details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_hours: Option<String>,
}

/// A recurring meeting slot (e.g. `MWF 10:00-10:50, Room 204`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingPattern {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One row of a grading breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingComponent {
    pub name: String,
    /// Weight in percent.
    pub weight: f32,
}

/// A course owned by a semester.
///
/// Immutable after creation except through [`CourseUpdate`] or a re-import
/// that supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    /// Normalized course code, e.g. `CS 101`.
    pub code: String,
    pub name: String,
    pub semester: SemesterKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<Instructor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<MeetingPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grading: Vec<GradingComponent>,
    /// SHA-256 of the source document bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Explicit, field-wise course update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseUpdate {
    pub name: Option<String>,
    pub instructor: Option<Instructor>,
    pub credits: Option<f32>,
    pub schedule: Option<Vec<MeetingPattern>>,
    pub grading: Option<Vec<GradingComponent>>,
}

impl CourseUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.instructor.is_none()
            && self.credits.is_none()
            && self.schedule.is_none()
            && self.grading.is_none()
    }

    /// Apply the update in place, bumping `updated_at`.
    pub fn apply(&self, course: &mut Course) {
        if let Some(name) = &self.name {
            course.name = name.clone();
        }
        if let Some(instructor) = &self.instructor {
            course.instructor = Some(instructor.clone());
        }
        if let Some(credits) = self.credits {
            course.credits = Some(credits);
        }
        if let Some(schedule) = &self.schedule {
            course.schedule = schedule.clone();
        }
        if let Some(grading) = &self.grading {
            course.grading = grading.clone();
        }
        course.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Canonical event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Exam,
    Assignment,
    Project,
    Administrative,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exam => "exam",
            Self::Assignment => "assignment",
            Self::Project => "project",
            Self::Administrative => "administrative",
        }
    }

    /// Assignments and projects are deadlines that can stack back-to-back.
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::Assignment | Self::Project)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-of-day window. A point in time is stored with `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Build a window, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn at(time: NaiveTime) -> Self {
        Self {
            start: time,
            end: time,
        }
    }

    /// Half-open overlap; equal starts always overlap, so point times collide
    /// with each other and with any window containing them.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        if self.start == other.start {
            return true;
        }
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start.format("%H:%M"))
        } else {
            write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
        }
    }
}

/// A dated academic obligation owned by exactly one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub course_id: CourseId,
    /// Denormalized owning course code, used for deterministic ordering.
    pub course_code: String,
    pub kind: EventKind,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
    /// Extraction certainty in `[0, 1]`.
    pub confidence: f32,
    /// Terminal flag; only a re-import that no longer lists the event removes it.
    #[serde(default)]
    pub completed: bool,
    /// Resolved date falls outside the owning semester's window.
    #[serde(default)]
    pub outside_semester: bool,
}

/// Literal identity of an event within its course: re-imports match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub date: NaiveDate,
    pub time: Option<TimeWindow>,
    pub kind: EventKind,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            date: self.date,
            time: self.time,
            kind: self.kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// Conflict severity tier, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the event fields a conflict report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub event_id: EventId,
    pub course_id: CourseId,
    pub course_code: String,
    pub title: String,
    pub kind: EventKind,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
}

impl From<&Event> for EventRef {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id,
            course_id: event.course_id,
            course_code: event.course_code.clone(),
            title: event.title.clone(),
            kind: event.kind,
            date: event.date,
            time: event.time,
        }
    }
}

/// A derived scheduling interaction between two events.
///
/// `first` is never later than `second`; each unordered pair is reported once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub first: EventRef,
    pub second: EventRef,
    pub severity: Severity,
    pub reason: String,
}

impl Conflict {
    pub fn involves(&self, id: EventId) -> bool {
        self.first.event_id == id || self.second.event_id == id
    }

    /// The pair as an order-independent key.
    pub fn pair(&self) -> (EventId, EventId) {
        let (a, b) = (self.first.event_id, self.second.event_id);
        if a <= b { (a, b) } else { (b, a) }
    }
}

// ---------------------------------------------------------------------------
// Import result & warnings
// ---------------------------------------------------------------------------

/// Category of a non-fatal import problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    OutsideSemester,
    DuplicateSuppressed,
    LowConfidence,
    GradingWeights,
    SemesterMismatch,
    AlreadyImported,
    /// A committed event the re-imported document no longer lists.
    EventRemoved,
}

/// A non-fatal validation warning attached to an import result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
}

impl ImportWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            event_id: None,
        }
    }

    pub fn for_event(kind: WarningKind, event_id: EventId, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            event_id: Some(event_id),
        }
    }
}

/// Ephemeral preview of a parsed syllabus; not persisted until confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub import_id: ImportId,
    pub semester: SemesterKey,
    pub course: Course,
    pub events: Vec<Event>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<ImportWarning>,
}

/// SHA-256 hex digest of raw document bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn ids_roundtrip() {
        let id = CourseId::new();
        let parsed: CourseId = id.to_string().parse().expect("parse CourseId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn semester_key_parsing() {
        let key: SemesterKey = "Fall 2025".parse().unwrap();
        assert_eq!(key, SemesterKey::new(Term::Fall, 2025));
        assert_eq!("spring-2026".parse::<SemesterKey>().unwrap().term, Term::Spring);
        assert_eq!("2025 Autumn".parse::<SemesterKey>().unwrap().term, Term::Fall);
        assert_eq!(
            "Summer Semester 2024".parse::<SemesterKey>().unwrap(),
            SemesterKey::new(Term::Summer, 2024)
        );
        assert!("Fall".parse::<SemesterKey>().is_err());
        assert!("Fall 2025 extra".parse::<SemesterKey>().is_err());
        assert_eq!(key.to_string(), "Fall 2025");
    }

    #[test]
    fn semester_key_ordering() {
        let mut keys = vec![
            SemesterKey::new(Term::Fall, 2025),
            SemesterKey::new(Term::Spring, 2026),
            SemesterKey::new(Term::Spring, 2025),
        ];
        keys.sort();
        assert_eq!(keys[0], SemesterKey::new(Term::Spring, 2025));
        assert_eq!(keys[2], SemesterKey::new(Term::Spring, 2026));
    }

    #[test]
    fn time_window_overlap() {
        let a = TimeWindow::new(t(10, 0), t(11, 0));
        let b = TimeWindow::new(t(10, 30), t(11, 30));
        let c = TimeWindow::new(t(11, 0), t(12, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c), "adjacent windows do not overlap");

        let point = TimeWindow::at(t(10, 15));
        assert!(point.overlaps(&a));
        assert!(a.overlaps(&point));
        assert!(!point.overlaps(&TimeWindow::at(t(10, 16))));
        assert!(point.overlaps(&TimeWindow::at(t(10, 15))));
    }

    #[test]
    fn time_window_swaps_reversed_bounds() {
        let w = TimeWindow::new(t(12, 0), t(11, 0));
        assert_eq!(w.start, t(11, 0));
        assert_eq!(w.to_string(), "11:00-12:00");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn course_update_applies_only_set_fields() {
        let now = Utc::now();
        let mut course = Course {
            id: CourseId::new(),
            code: "CS 101".into(),
            name: "Intro".into(),
            semester: SemesterKey::new(Term::Fall, 2025),
            instructor: None,
            credits: Some(3.0),
            schedule: vec![],
            grading: vec![],
            source_hash: None,
            created_at: now,
            updated_at: now,
        };
        let update = CourseUpdate {
            name: Some("Introduction to Programming".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        update.apply(&mut course);
        assert_eq!(course.name, "Introduction to Programming");
        assert_eq!(course.credits, Some(3.0));
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"syllabus"), content_hash(b"syllabus"));
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[test]
    fn event_serialization() {
        let event = Event {
            id: EventId::new(),
            course_id: CourseId::new(),
            course_code: "MATH 221".into(),
            kind: EventKind::Exam,
            title: "Midterm".into(),
            date: NaiveDate::from_ymd_opt(2025, 10, 14).unwrap(),
            time: Some(TimeWindow::new(t(10, 0), t(11, 0))),
            confidence: 0.9,
            completed: false,
            outside_semester: false,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"kind\":\"exam\""));
        let parsed: Event = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, event);
    }
}
