//! Pairwise conflict detection over one semester's events.
//!
//! Events are sorted by date and swept with a window of
//! `max(proximity_days, 1)` days, so only pairs that can possibly match a
//! rule are classified. Each unordered pair is reported at most once, with
//! the earlier event first.

use std::cmp::Ordering;

use syllabus_shared::{Conflict, ConflictConfig, Event, EventKind, EventRef, Severity};
use tracing::debug;

/// Classify a pair by the most specific rule that applies.
///
/// Symmetric: `classify(a, b) == classify(b, a)`.
pub fn classify(a: &Event, b: &Event, proximity_days: u32) -> Option<(Severity, String)> {
    let gap = (a.date - b.date).num_days().abs();

    if gap == 0 {
        if let (Some(ta), Some(tb)) = (a.time, b.time) {
            if ta.overlaps(&tb) {
                let (early, late) = if ta <= tb { (ta, tb) } else { (tb, ta) };
                return Some((
                    Severity::Critical,
                    format!("overlapping times on {}: {early} and {late}", a.date),
                ));
            }
        }
        if a.kind == EventKind::Exam && b.kind == EventKind::Exam {
            return Some((Severity::High, format!("two exams on {}", a.date)));
        }
    }

    if gap == 1 && a.kind.is_deadline() && b.kind.is_deadline() {
        return Some((
            Severity::Medium,
            "back-to-back deadlines on consecutive days".to_string(),
        ));
    }

    if gap <= i64::from(proximity_days) {
        let reason = match gap {
            0 => "same day".to_string(),
            1 => "1 day apart".to_string(),
            n => format!("{n} days apart"),
        };
        return Some((Severity::Low, reason));
    }

    None
}

/// Sweep order: date, then course code, then id.
fn sweep_order(a: &Event, b: &Event) -> Ordering {
    (a.date, &a.course_code, a.id).cmp(&(b.date, &b.course_code, b.id))
}

/// Output order: the earlier event's date and course code, then the later
/// event's, then ids so equal-looking pairs stay stable.
fn report_order(a: &Conflict, b: &Conflict) -> Ordering {
    (
        a.first.date,
        &a.first.course_code,
        a.second.date,
        &a.second.course_code,
        a.first.event_id,
        a.second.event_id,
    )
        .cmp(&(
            b.first.date,
            &b.first.course_code,
            b.second.date,
            &b.second.course_code,
            b.first.event_id,
            b.second.event_id,
        ))
}

fn conflict(first: &Event, second: &Event, severity: Severity, reason: String) -> Conflict {
    Conflict {
        first: EventRef::from(first),
        second: EventRef::from(second),
        severity,
        reason,
    }
}

/// Detect every conflict among `events`.
///
/// Pure: the same input always yields the same list in the same order.
pub fn detect_conflicts(events: &[Event], config: &ConflictConfig) -> Vec<Conflict> {
    let mut sorted: Vec<&Event> = events
        .iter()
        .filter(|e| !(config.ignore_completed && e.completed))
        .collect();
    sorted.sort_by(|a, b| sweep_order(a, b));

    let window = i64::from(config.proximity_days.max(1));
    let mut conflicts = Vec::new();
    for (i, first) in sorted.iter().enumerate() {
        for second in &sorted[i + 1..] {
            if (second.date - first.date).num_days() > window {
                break;
            }
            if let Some((severity, reason)) = classify(first, second, config.proximity_days) {
                conflicts.push(conflict(first, second, severity, reason));
            }
        }
    }

    conflicts.sort_by(report_order);
    debug!(
        events = sorted.len(),
        conflicts = conflicts.len(),
        "conflict sweep finished"
    );
    conflicts
}

/// Full pairwise scan, kept to check the sweep against.
#[cfg(test)]
pub(crate) fn detect_conflicts_naive(events: &[Event], config: &ConflictConfig) -> Vec<Conflict> {
    let active: Vec<&Event> = events
        .iter()
        .filter(|e| !(config.ignore_completed && e.completed))
        .collect();

    let mut conflicts = Vec::new();
    for i in 0..active.len() {
        for j in 0..active.len() {
            if i == j {
                continue;
            }
            let (a, b) = (active[i], active[j]);
            if sweep_order(a, b) != Ordering::Less {
                continue;
            }
            if let Some((severity, reason)) = classify(a, b, config.proximity_days) {
                conflicts.push(conflict(a, b, severity, reason));
            }
        }
    }
    conflicts.sort_by(report_order);
    conflicts
}
