//! Field-recognition passes.
//!
//! Each pass is a pure function over normalized lines returning partial
//! [`Findings`]. Passes run in order and their findings are folded together
//! with [`Findings::merge`]; a pass that finds nothing returns the default.

mod events;
mod grading;
mod identity;
mod people;
mod schedule;
mod semester;

use syllabus_shared::{GradingComponent, MeetingPattern, SemesterKey};

use crate::CandidateEvent;
use crate::normalize::Line;

pub(crate) use grading::total_weight;
pub(crate) use identity::derive_code;

/// A field value proposed by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T> {
    pub value: T,
    /// Certainty in `[0, 1]`.
    pub confidence: f32,
    /// How narrow the matching pattern is; labelled fields beat bare ones.
    pub specificity: u8,
}

impl<T> Candidate<T> {
    pub fn new(value: T, confidence: f32, specificity: u8) -> Self {
        Self {
            value,
            confidence,
            specificity,
        }
    }

    /// Whether this candidate should replace `current`.
    ///
    /// A set field is only replaced by strictly higher confidence, or by equal
    /// confidence from a strictly more specific pattern.
    pub fn beats(&self, current: &Candidate<T>) -> bool {
        self.confidence > current.confidence
            || (self.confidence == current.confidence && self.specificity > current.specificity)
    }
}

fn offer<T>(slot: &mut Option<Candidate<T>>, candidate: Option<Candidate<T>>) {
    let Some(candidate) = candidate else { return };
    match slot {
        Some(current) if !candidate.beats(current) => {}
        _ => *slot = Some(candidate),
    }
}

/// Partial parse result. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    pub code: Option<Candidate<String>>,
    pub name: Option<Candidate<String>>,
    pub semester: Option<Candidate<SemesterKey>>,
    pub instructor: Option<Candidate<String>>,
    pub email: Option<Candidate<String>>,
    pub office_hours: Option<Candidate<String>>,
    pub credits: Option<Candidate<f32>>,
    pub schedule: Option<Candidate<Vec<MeetingPattern>>>,
    pub grading: Option<Candidate<Vec<GradingComponent>>>,
    pub events: Vec<CandidateEvent>,
}

impl Findings {
    /// Fold `other` into `self` field by field.
    pub fn merge(&mut self, other: Findings) {
        offer(&mut self.code, other.code);
        offer(&mut self.name, other.name);
        offer(&mut self.semester, other.semester);
        offer(&mut self.instructor, other.instructor);
        offer(&mut self.email, other.email);
        offer(&mut self.office_hours, other.office_hours);
        offer(&mut self.credits, other.credits);
        offer(&mut self.schedule, other.schedule);
        offer(&mut self.grading, other.grading);
        self.events.extend(other.events);
    }
}

/// A field-recognition pass.
pub type Pass = fn(&[Line]) -> Findings;

/// All passes, in the order they run.
pub const PASSES: &[(&str, Pass)] = &[
    ("labelled_identity", identity::labelled),
    ("heading_code", identity::heading),
    ("anywhere_code", identity::anywhere),
    ("semester_label", semester::detect),
    ("instructor", people::instructor),
    ("credits", people::credits),
    ("meeting_schedule", schedule::meeting_times),
    ("grading_table", grading::components),
    ("dated_events", events::dated_events),
];

#[cfg(test)]
pub(crate) fn lines(text: &str) -> Vec<Line> {
    crate::normalize::normalize(&syllabus_extract::ExtractedDocument::from_text(text))
}
