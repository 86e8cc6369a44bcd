//! Candidate events → canonical events.
//!
//! Resolves every candidate date against the semester window, maps parser
//! keywords to [`EventKind`], collapses duplicates, and flags events that
//! fall outside the semester or carry low confidence. Nothing is dropped for
//! being out of window; only dates that cannot be resolved at all are.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate};
use syllabus_parser::{CandidateEvent, DateSpec, year_in_window};
use syllabus_shared::{
    Course, Event, EventId, EventKind, ImportWarning, NormalizerConfig, Semester, WarningKind,
};
use tracing::debug;

/// Output of [`normalize_events`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedEvents {
    /// Sorted by date, time, kind, then title.
    pub events: Vec<Event>,
    pub warnings: Vec<ImportWarning>,
}

/// Canonical kind for a parser keyword.
pub fn event_kind(keyword: &str) -> EventKind {
    match keyword {
        "final exam" | "final" | "midterm" | "exam" | "quiz" | "test" => EventKind::Exam,
        "project" | "presentation" | "proposal" | "paper" | "report" => EventKind::Project,
        "no class" | "holiday" | "break" | "drop" | "withdraw" | "registration"
        | "reading day" | "last day" => EventKind::Administrative,
        _ => EventKind::Assignment,
    }
}

/// Resolve a date spec to a calendar date within (or nearest to) `semester`.
///
/// Week 1 is the Monday-based week containing the semester start. A relative
/// date without a weekday lands on the first teaching day of its week.
pub fn resolve_date(spec: &DateSpec, semester: &Semester) -> Option<NaiveDate> {
    match *spec {
        DateSpec::Absolute { date } => Some(date),
        DateSpec::Partial { month, day } => year_in_window(month, day, semester),
        DateSpec::Relative { week, weekday } => {
            if week == 0 {
                return None;
            }
            let offset = semester.start.weekday().num_days_from_monday();
            let monday = semester.start.checked_sub_days(Days::new(offset.into()))?;
            let week_start = monday.checked_add_days(Days::new(u64::from(week - 1) * 7))?;
            match weekday {
                Some(day) => {
                    week_start.checked_add_days(Days::new(day.num_days_from_monday().into()))
                }
                None => Some(week_start.max(semester.start)),
            }
        }
    }
}

/// Normalize parser candidates into events owned by `course`.
pub fn normalize_events(
    candidates: &[CandidateEvent],
    course: &Course,
    semester: &Semester,
    config: &NormalizerConfig,
) -> NormalizedEvents {
    let mut warnings = Vec::new();

    let mut events: Vec<Event> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(date) = resolve_date(&candidate.date, semester) else {
            warnings.push(ImportWarning::new(
                WarningKind::LowConfidence,
                format!(
                    "could not place '{}' on the calendar; skipped",
                    display_title(candidate)
                ),
            ));
            continue;
        };
        events.push(Event {
            id: EventId::new(),
            course_id: course.id,
            course_code: course.code.clone(),
            kind: event_kind(&candidate.keyword),
            title: display_title(candidate),
            date,
            time: candidate.time,
            confidence: candidate.confidence.clamp(0.0, 1.0),
            completed: false,
            outside_semester: false,
        });
    }

    let mut events = collapse_similar(events, config.title_similarity, &mut warnings);
    events = combine_key_collisions(events, &mut warnings);

    for event in &mut events {
        if !semester.contains(event.date) {
            event.outside_semester = true;
            warnings.push(ImportWarning::for_event(
                WarningKind::OutsideSemester,
                event.id,
                format!(
                    "'{}' on {} falls outside {} ({} to {})",
                    event.title, event.date, semester.key, semester.start, semester.end
                ),
            ));
        }
        if event.confidence < config.low_confidence {
            warnings.push(ImportWarning::for_event(
                WarningKind::LowConfidence,
                event.id,
                format!("'{}' extracted with confidence {:.2}", event.title, event.confidence),
            ));
        }
    }

    events.sort_by(|a, b| {
        (a.date, a.time, a.kind, &a.title).cmp(&(b.date, b.time, b.kind, &b.title))
    });
    debug!(
        candidates = candidates.len(),
        events = events.len(),
        warnings = warnings.len(),
        "normalized events"
    );
    NormalizedEvents { events, warnings }
}

fn display_title(candidate: &CandidateEvent) -> String {
    let title = candidate.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    let mut chars = candidate.keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Untitled".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

fn tokens(title: &str) -> HashSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Token Jaccard similarity, or 1.0 when one token set contains the other.
pub fn title_similarity(a: &str, b: &str) -> f32 {
    let (a, b) = (tokens(a), tokens(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.is_subset(&b) || b.is_subset(&a) {
        return 1.0;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f32 / union as f32
}

fn is_duplicate(a: &Event, b: &Event, threshold: f32) -> bool {
    if a.date != b.date || a.kind != b.kind {
        return false;
    }
    let same_time = a.time.is_some() && a.time == b.time;
    same_time || title_similarity(&a.title, &b.title) >= threshold
}

/// Fold `loser` into `winner`: the higher-confidence fields stay, a missing
/// time is back-filled.
fn absorb(winner: &mut Event, loser: Event) {
    if loser.confidence > winner.confidence {
        let keep_id = winner.id;
        let fallback_time = winner.time;
        *winner = Event { id: keep_id, ..loser };
        winner.time = winner.time.or(fallback_time);
    } else {
        winner.time = winner.time.or(loser.time);
    }
}

fn collapse_similar(
    events: Vec<Event>,
    threshold: f32,
    warnings: &mut Vec<ImportWarning>,
) -> Vec<Event> {
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        match kept.iter_mut().find(|k| is_duplicate(k, &event, threshold)) {
            Some(existing) => {
                warnings.push(ImportWarning::for_event(
                    WarningKind::DuplicateSuppressed,
                    existing.id,
                    format!(
                        "'{}' on {} repeats '{}'; merged",
                        event.title, event.date, existing.title
                    ),
                ));
                absorb(existing, event);
            }
            None => kept.push(event),
        }
    }
    kept
}

/// Distinct obligations that still share a (date, time, kind) key become one
/// event listing both titles, since a course cannot hold two events on the
/// same key.
fn combine_key_collisions(events: Vec<Event>, warnings: &mut Vec<ImportWarning>) -> Vec<Event> {
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        match kept.iter_mut().find(|k| k.key() == event.key()) {
            Some(existing) => {
                warnings.push(ImportWarning::for_event(
                    WarningKind::DuplicateSuppressed,
                    existing.id,
                    format!(
                        "'{}' and '{}' share {} {}; combined",
                        existing.title, event.title, event.date, event.kind
                    ),
                ));
                existing.title = format!("{}; {}", existing.title, event.title);
                existing.confidence = existing.confidence.max(event.confidence);
            }
            None => kept.push(event),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc, Weekday};
    use syllabus_shared::{CourseId, SemesterKey, Term, TimeWindow};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn fall() -> Semester {
        Semester {
            key: SemesterKey::new(Term::Fall, 2025),
            start: d(2025, 8, 20),
            end: d(2025, 12, 20),
        }
    }

    fn course() -> Course {
        let now = Utc::now();
        Course {
            id: CourseId::new(),
            code: "CS 101".into(),
            name: "Intro".into(),
            semester: fall().key,
            instructor: None,
            credits: None,
            schedule: vec![],
            grading: vec![],
            source_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn candidate(keyword: &str, title: &str, date: DateSpec, confidence: f32) -> CandidateEvent {
        CandidateEvent {
            keyword: keyword.into(),
            title: title.into(),
            date,
            time: None,
            confidence,
            page: 1,
        }
    }

    fn abs(m: u32, day: u32) -> DateSpec {
        DateSpec::Absolute {
            date: d(2025, m, day),
        }
    }

    #[test]
    fn keyword_kinds() {
        assert_eq!(event_kind("midterm"), EventKind::Exam);
        assert_eq!(event_kind("final"), EventKind::Exam);
        assert_eq!(event_kind("proposal"), EventKind::Project);
        assert_eq!(event_kind("lab report"), EventKind::Assignment);
        assert_eq!(event_kind("due"), EventKind::Assignment);
        assert_eq!(event_kind("no class"), EventKind::Administrative);
    }

    #[test]
    fn relative_dates_count_from_the_start_week() {
        // Aug 20 2025 is a Wednesday; week 1 runs Mon Aug 18 to Sun Aug 24.
        let fall = fall();
        let tue = DateSpec::Relative {
            week: 1,
            weekday: Some(Weekday::Tue),
        };
        assert_eq!(resolve_date(&tue, &fall), Some(d(2025, 8, 19)));
        let week5 = DateSpec::Relative {
            week: 5,
            weekday: Some(Weekday::Tue),
        };
        assert_eq!(resolve_date(&week5, &fall), Some(d(2025, 9, 16)));
        let bare = DateSpec::Relative {
            week: 1,
            weekday: None,
        };
        assert_eq!(resolve_date(&bare, &fall), Some(d(2025, 8, 20)));
        let bare3 = DateSpec::Relative {
            week: 3,
            weekday: None,
        };
        assert_eq!(resolve_date(&bare3, &fall), Some(d(2025, 9, 1)));
        assert_eq!(
            resolve_date(
                &DateSpec::Relative {
                    week: 0,
                    weekday: None
                },
                &fall
            ),
            None
        );
    }

    #[test]
    fn unreachable_weeks_resolve_to_nothing() {
        let far = DateSpec::Relative {
            week: u32::MAX,
            weekday: Some(Weekday::Fri),
        };
        assert_eq!(resolve_date(&far, &fall()), None);
    }

    #[test]
    fn partial_dates_take_the_window_year() {
        let spring = Semester {
            key: SemesterKey::new(Term::Spring, 2026),
            start: d(2026, 1, 8),
            end: d(2026, 5, 15),
        };
        let spec = DateSpec::Partial { month: 3, day: 4 };
        assert_eq!(resolve_date(&spec, &spring), Some(d(2026, 3, 4)));
    }

    #[test]
    fn similar_titles_collapse_keeping_higher_confidence() {
        let mut low = candidate("midterm", "Midterm", abs(10, 14), 0.6);
        low.time = Some(TimeWindow::new(t(10, 0), t(11, 0)));
        let high = candidate("midterm", "Midterm exam", abs(10, 14), 0.9);

        let out = normalize_events(&[low, high], &course(), &fall(), &NormalizerConfig::default());
        assert_eq!(out.events.len(), 1);
        let event = &out.events[0];
        assert_eq!(event.title, "Midterm exam");
        assert_eq!(event.time, Some(TimeWindow::new(t(10, 0), t(11, 0))));
        assert!((event.confidence - 0.9).abs() < f32::EPSILON);
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == WarningKind::DuplicateSuppressed)
        );
    }

    #[test]
    fn distinct_titles_on_one_key_are_combined() {
        let a = candidate("homework", "Homework 3", abs(10, 3), 0.8);
        let b = candidate("lab", "Lab 2", abs(10, 3), 0.7);
        let out = normalize_events(&[a, b], &course(), &fall(), &NormalizerConfig::default());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].title, "Homework 3; Lab 2");
    }

    #[test]
    fn different_kinds_on_one_day_stay_separate() {
        let a = candidate("quiz", "Quiz 2", abs(10, 3), 0.8);
        let b = candidate("homework", "Homework 3", abs(10, 3), 0.8);
        let out = normalize_events(&[a, b], &course(), &fall(), &NormalizerConfig::default());
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].kind, EventKind::Exam);
    }

    #[test]
    fn out_of_window_events_are_kept_and_flagged() {
        let late = candidate("final exam", "Final exam", DateSpec::Absolute { date: d(2026, 1, 5) }, 0.9);
        let out = normalize_events(&[late], &course(), &fall(), &NormalizerConfig::default());
        assert_eq!(out.events.len(), 1);
        assert!(out.events[0].outside_semester);
        assert_eq!(out.warnings[0].kind, WarningKind::OutsideSemester);
        assert_eq!(out.warnings[0].event_id, Some(out.events[0].id));
    }

    #[test]
    fn low_confidence_and_unresolvable_warn() {
        let weak = candidate("due", "", abs(9, 12), 0.45);
        let lost = candidate(
            "quiz",
            "Quiz 0",
            DateSpec::Relative {
                week: 0,
                weekday: None,
            },
            0.9,
        );
        let out = normalize_events(&[weak, lost], &course(), &fall(), &NormalizerConfig::default());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].title, "Due");
        let kinds: Vec<_> = out.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::LowConfidence, WarningKind::LowConfidence]);
    }

    #[test]
    fn output_is_sorted() {
        let cands = vec![
            candidate("project", "Project", abs(11, 20), 0.8),
            candidate("quiz", "Quiz 1", abs(9, 5), 0.8),
            candidate("midterm", "Midterm", abs(10, 14), 0.8),
        ];
        let out = normalize_events(&cands, &course(), &fall(), &NormalizerConfig::default());
        let dates: Vec<_> = out.events.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![d(2025, 9, 5), d(2025, 10, 14), d(2025, 11, 20)]);
        assert!(out.events.iter().all(|e| e.course_code == "CS 101"));
    }

    #[test]
    fn similarity_measure() {
        assert!((title_similarity("Midterm", "Midterm Exam") - 1.0).abs() < f32::EPSILON);
        assert!(title_similarity("Homework 1", "Homework 2") < 0.6);
        assert!(title_similarity("Final project report", "Final project demo") >= 0.5);
        assert_eq!(title_similarity("", "Quiz"), 0.0);
    }
}
