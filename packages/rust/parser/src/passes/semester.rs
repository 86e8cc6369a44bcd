//! Semester label recognition (`Fall 2025`, `Spring Semester 2026`).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use syllabus_shared::{SemesterKey, Term};

use super::{Candidate, Findings};
use crate::normalize::Line;

pub(super) static SEMESTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(fall|autumn|spring|summer|winter)\s+(?:(?:semester|term|quarter|session)\s+)?(\d{4})\b",
    )
    .expect("valid regex")
});

fn first_label(text: &str) -> Option<SemesterKey> {
    SEMESTER_RE.captures_iter(text).find_map(|caps| {
        let term: Term = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        (1900..=2200)
            .contains(&year)
            .then_some(SemesterKey::new(term, year))
    })
}

pub(super) fn detect(lines: &[Line]) -> Findings {
    static LABELLED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\s*(?:semester|term|session)\s*[:\-]\s*(.+)$").expect("valid regex")
    });

    if let Some(key) = lines
        .iter()
        .filter_map(|l| LABELLED_RE.captures(&l.text))
        .find_map(|caps| first_label(&caps[1]))
    {
        return Findings {
            semester: Some(Candidate::new(key, 0.9, 2)),
            ..Default::default()
        };
    }

    let mut counts: HashMap<SemesterKey, (usize, usize)> = HashMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(key) = first_label(&line.text) {
            counts.entry(key).or_insert((0, idx)).0 += 1;
        }
    }
    let best = counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then_with(|| b.1.1.cmp(&a.1.1)));

    Findings {
        semester: best.map(|(key, _)| Candidate::new(key, 0.8, 1)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::lines;
    use super::*;

    fn detected(text: &str) -> Option<SemesterKey> {
        detect(&lines(text)).semester.map(|c| c.value)
    }

    #[test]
    fn bare_labels() {
        assert_eq!(
            detected("CS 101 - Fall 2025"),
            Some(SemesterKey::new(Term::Fall, 2025))
        );
        assert_eq!(
            detected("Spring Semester 2026 syllabus"),
            Some(SemesterKey::new(Term::Spring, 2026))
        );
        assert_eq!(detected("No label here"), None);
    }

    #[test]
    fn labelled_beats_frequency() {
        let text = "Prereq taken Spring 2025\nSpring 2025 notes\nTerm: Autumn 2025";
        assert_eq!(detected(text), Some(SemesterKey::new(Term::Fall, 2025)));
    }

    #[test]
    fn most_frequent_label_wins() {
        let text = "Summer 2024 archive\nWinter 2026\nWinter 2026";
        assert_eq!(detected(text), Some(SemesterKey::new(Term::Winter, 2026)));
    }
}
