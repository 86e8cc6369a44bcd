//! Course code and title recognition.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::semester::SEMESTER_RE;
use super::{Candidate, Findings};
use crate::dates::find_dates;
use crate::normalize::Line;

/// Uppercase department prefix plus a 3-4 digit number (`CS 101`, `MATH-221`,
/// `COMP1010`, `BIO 110L`).
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2,5})\s?-?\s?(\d{3,4}[A-Z]?)\b").expect("valid regex")
});

/// Uppercase words that precede numbers without being departments.
const NOT_DEPARTMENTS: &[&str] = &[
    "AM", "PM", "RM", "ROOM", "BLDG", "HALL", "SUITE", "BOX", "PO", "APT", "TEL", "FAX", "EXT",
    "PAGE", "WEEK", "UNIT", "ISBN", "FALL", "SPRING", "SUMMER", "WINTER", "JAN", "FEB", "MAR",
    "APR", "MAY", "JUN", "JUNE", "JUL", "JULY", "AUG", "SEP", "SEPT", "OCT", "NOV", "DEC", "HW",
    "CH", "NO", "ID", "CRN",
];

/// First plausible course code in `text`, as `PREFIX NUMBER`, with its span.
fn find_code(text: &str) -> Option<(String, usize, usize)> {
    CODE_RE.captures_iter(text).find_map(|caps| {
        let prefix = caps.get(1)?.as_str();
        if NOT_DEPARTMENTS.contains(&prefix) {
            return None;
        }
        let whole = caps.get(0)?;
        Some((
            format!("{prefix} {}", &caps[2]),
            whole.start(),
            whole.end(),
        ))
    })
}

/// Tidy a course title: drop trailing semester labels and separators.
fn clean_name(raw: &str) -> Option<String> {
    let without_label = match SEMESTER_RE.find(raw) {
        Some(m) if m.start() > 0 => &raw[..m.start()],
        _ => raw,
    };
    let name = without_label
        .trim()
        .trim_matches(|c: char| matches!(c, '-' | ':' | '|' | ',' | '(' | ')' | '*') || c.is_whitespace())
        .to_string();
    (name.chars().filter(|c| c.is_alphabetic()).count() >= 3).then_some(name)
}

/// Split `CS 101: Intro to Programming` into code and title.
fn code_and_rest(text: &str, anchored: bool) -> Option<(String, Option<String>)> {
    let (code, start, end) = find_code(text)?;
    if anchored && !text[..start].trim().is_empty() {
        return None;
    }
    Some((code, clean_name(&text[end..])))
}

// ---------------------------------------------------------------------------
// Pass: labelled identity ("Course: CS 101 - ...", "Course Title: ...")
// ---------------------------------------------------------------------------

pub(super) fn labelled(lines: &[Line]) -> Findings {
    static COURSE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\s*course(?:\s+(?:code|number|no\.?|id|#))?\s*[:\-]\s*(.+)$")
            .expect("valid regex")
    });
    static TITLE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\s*(?:course\s+(?:title|name)|title)\s*[:\-]\s*(.+)$")
            .expect("valid regex")
    });

    let mut findings = Findings::default();
    for line in lines {
        if let Some(caps) = COURSE_LABEL_RE.captures(&line.text) {
            let value = &caps[1];
            match code_and_rest(value, true) {
                Some((code, name)) => {
                    findings.code.get_or_insert(Candidate::new(code, 0.95, 3));
                    if let Some(name) = name {
                        findings.name.get_or_insert(Candidate::new(name, 0.9, 3));
                    }
                }
                None => {
                    if let Some(name) = clean_name(value) {
                        findings.name.get_or_insert(Candidate::new(name, 0.85, 3));
                    }
                }
            }
        } else if let Some(caps) = TITLE_LABEL_RE.captures(&line.text) {
            if let Some(name) = clean_name(&caps[1]) {
                findings.name.get_or_insert(Candidate::new(name, 0.9, 3));
            }
        }
    }
    findings
}

// ---------------------------------------------------------------------------
// Pass: heading code ("CS 101: Introduction to Programming" near the top)
// ---------------------------------------------------------------------------

/// Non-blank lines at the top of the document considered a heading.
const HEADING_LINES: usize = 6;

pub(super) fn heading(lines: &[Line]) -> Findings {
    let mut findings = Findings::default();
    let top: Vec<&Line> = lines
        .iter()
        .filter(|l| !l.is_blank() && !l.is_table_row())
        .take(HEADING_LINES)
        .collect();

    for (idx, line) in top.iter().enumerate() {
        let Some((code, name)) = code_and_rest(&line.text, true) else {
            continue;
        };
        findings.code = Some(Candidate::new(code, 0.85, 2));
        findings.name = match name {
            Some(name) => Some(Candidate::new(name, 0.8, 2)),
            // Code alone on its line: the title usually follows.
            None => top
                .get(idx + 1)
                .filter(|next| {
                    find_code(&next.text).is_none()
                        && !next.text.contains(':')
                        && find_dates(&next.text).is_empty()
                })
                .and_then(|next| clean_name(&next.text))
                .map(|name| Candidate::new(name, 0.6, 1)),
        };
        break;
    }
    findings
}

// ---------------------------------------------------------------------------
// Pass: most frequent course code anywhere
// ---------------------------------------------------------------------------

pub(super) fn anywhere(lines: &[Line]) -> Findings {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some((code, _, _)) = find_code(&line.text) {
            let entry = counts.entry(code).or_insert((0, idx));
            entry.0 += 1;
        }
    }
    // Most mentions wins; ties go to the earliest mention.
    let best = counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then_with(|| b.1.1.cmp(&a.1.1)));

    Findings {
        code: best.map(|(code, _)| Candidate::new(code, 0.6, 1)),
        ..Default::default()
    }
}

/// Synthesize a code from a title when the document names none:
/// initials of the significant words (`Introduction to Programming` -> `IP`).
pub(crate) fn derive_code(name: &str) -> String {
    const SKIP: &[&str] = &["and", "the", "for", "with", "into", "from", "of", "to", "in"];
    let initials: String = name
        .split_whitespace()
        .filter(|w| !SKIP.contains(&w.to_lowercase().as_str()))
        .filter_map(|w| w.chars().find(|c| c.is_alphabetic()))
        .flat_map(char::to_uppercase)
        .take(5)
        .collect();
    if initials.is_empty() {
        "COURSE".to_string()
    } else {
        initials
    }
}
