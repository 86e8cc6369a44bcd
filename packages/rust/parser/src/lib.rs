//! Syllabus field recognition.
//!
//! [`parse`] normalizes extractor output, runs the ordered field passes in
//! [`passes::PASSES`], merges their findings by confidence and specificity,
//! and resolves missing years on candidate event dates. Parsing only fails
//! when no course identity (code or title) can be recovered.

pub mod dates;
pub mod normalize;
pub mod passes;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use syllabus_extract::ExtractedDocument;
use syllabus_shared::{
    GradingComponent, ImportWarning, Instructor, MeetingPattern, Result, Semester, SemesterKey,
    SyllabusError, TimeWindow, WarningKind,
};
use tracing::{debug, info, instrument};

pub use dates::DateSpec;
pub use passes::{Candidate, Findings};

/// Weights may be off by this much from 100 before a warning is raised.
const GRADING_TOLERANCE: f32 = 1.0;

/// Context the caller supplies for year resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// The semester the user says this syllabus belongs to, already resolved
    /// to its academic window.
    pub semester_hint: Option<Semester>,
    /// Last-resort year for dates that carry none (usually the current year).
    pub reference_year: Option<i32>,
}

/// A dated obligation as found in the text, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Canonical obligation keyword (`midterm`, `homework`, `no class`, ...).
    pub keyword: String,
    pub title: String,
    pub date: DateSpec,
    pub time: Option<TimeWindow>,
    pub confidence: f32,
    /// Page the event was found on.
    pub page: u32,
}

/// Course fields recovered from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub code: String,
    pub name: String,
    pub instructor: Option<Instructor>,
    pub credits: Option<f32>,
    pub schedule: Vec<MeetingPattern>,
    pub grading: Vec<GradingComponent>,
}

/// Parser output: a partially populated course plus candidate events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSyllabus {
    pub course: CourseDraft,
    pub events: Vec<CandidateEvent>,
    /// Semester label found in the document, if any.
    pub detected_semester: Option<SemesterKey>,
    pub warnings: Vec<ImportWarning>,
}

/// Parse extractor output into course fields and candidate events.
#[instrument(skip_all, fields(pages = doc.pages.len()))]
pub fn parse(doc: &ExtractedDocument, options: &ParseOptions) -> Result<ParsedSyllabus> {
    let start = Instant::now();
    let lines = normalize::normalize(doc);

    let mut findings = Findings::default();
    for (name, pass) in passes::PASSES {
        let found = pass(&lines);
        debug!(pass = name, events = found.events.len(), "field pass finished");
        findings.merge(found);
    }

    let mut warnings = Vec::new();

    let name = findings.name.map(|c| c.value);
    let code = match (findings.code, &name) {
        (Some(code), _) => code.value,
        (None, Some(name)) => {
            let code = passes::derive_code(name);
            warnings.push(ImportWarning::new(
                WarningKind::LowConfidence,
                format!("no course code found; derived '{code}' from the title"),
            ));
            code
        }
        (None, None) => {
            return Err(SyllabusError::parse(
                "no course code or title found in document",
            ));
        }
    };
    let name = name.unwrap_or_else(|| code.clone());

    let detected_semester = findings.semester.map(|c| c.value);
    if let (Some(hint), Some(detected)) = (options.semester_hint, detected_semester) {
        if hint.key != detected {
            warnings.push(ImportWarning::new(
            WarningKind::SemesterMismatch,
                format!("document says {detected}, importing into {}", hint.key),
            ));
        }
    }

    let grading = findings.grading.map(|c| c.value).unwrap_or_default();
    if !grading.is_empty() {
        let total = passes::total_weight(&grading);
        if (total - 100.0).abs() > GRADING_TOLERANCE {
            warnings.push(ImportWarning::new(
                WarningKind::GradingWeights,
                format!("grading weights sum to {total}%, not 100%"),
            ));
        }
    }

    let instructor = match (findings.instructor, findings.email) {
        (Some(name), email) => Some(Instructor {
            name: name.value,
            email: email.map(|e| e.value),
            office_hours: findings.office_hours.map(|o| o.value),
        }),
        (None, Some(email)) => Some(Instructor {
            name: email.value.clone(),
            email: Some(email.value),
            office_hours: findings.office_hours.map(|o| o.value),
        }),
        (None, None) => None,
    };

    let mut events = findings.events;
    resolve_years(&mut events, options, detected_semester);

    let course = CourseDraft {
        code,
        name,
        instructor,
        credits: findings.credits.map(|c| c.value),
        schedule: findings.schedule.map(|c| c.value).unwrap_or_default(),
        grading,
    };

    info!(
        course = %course.code,
        events = events.len(),
        warnings = warnings.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "syllabus parsed"
    );

    Ok(ParsedSyllabus {
        course,
        events,
        detected_semester,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Year resolution
// ---------------------------------------------------------------------------

/// Give year-less dates a year: the hint's window first, then the most common
/// explicit year, then the detected label's year, then the reference year.
/// Dates stay partial only when none of these exist.
fn resolve_years(
    events: &mut [CandidateEvent],
    options: &ParseOptions,
    detected: Option<SemesterKey>,
) {
    if let Some(semester) = options.semester_hint {
        for event in events.iter_mut() {
            if let DateSpec::Partial { month, day } = event.date {
                if let Some(date) = year_in_window(month, day, &semester) {
                    event.date = DateSpec::Absolute { date };
                }
            }
        }
        return;
    }

    let Some(year) = dominant_year(events)
        .or(detected.map(|k| k.year))
        .or(options.reference_year)
    else {
        return;
    };
    for event in events.iter_mut() {
        if let DateSpec::Partial { month, day } = event.date {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                event.date = DateSpec::Absolute { date };
            }
        }
    }
}

/// The year placing `month/day` inside the window, else the one nearest to it.
pub fn year_in_window(month: u32, day: u32, semester: &Semester) -> Option<NaiveDate> {
    let first = semester.start.year() - 1;
    let last = semester.end.year() + 1;
    (first..=last)
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .min_by_key(|date| {
            if semester.contains(*date) {
                0
            } else if *date < semester.start {
                (semester.start - *date).num_days()
            } else {
                (*date - semester.end).num_days()
            }
        })
}

/// Most common year among explicit dates; ties go to the earlier year.
fn dominant_year(events: &[CandidateEvent]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for date in events.iter().filter_map(|e| e.date.absolute()) {
        *counts.entry(date.year()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(year, _)| year)
}
