//! Instructor, contact, and credit-hour recognition.

use std::sync::LazyLock;

use regex::Regex;

use super::{Candidate, Findings};
use crate::normalize::Line;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+").expect("valid regex")
});

/// Lines after an instructor label still considered part of its block.
const CONTACT_BLOCK: usize = 3;

pub(super) fn instructor(lines: &[Line]) -> Findings {
    static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\s*(?:instructor|professor|lecturer|teacher|taught\s+by|faculty)(?:\s+name)?\s*[:\-]\s*(.+)$",
        )
        .expect("valid regex")
    });
    static TITLED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b((?:Prof(?:essor)?\.?|Dr\.)\s+[A-Z][a-z]+(?:\s+[A-Z][a-z'\-]+){0,2})")
            .expect("valid regex")
    });
    static OFFICE_HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\s*office\s+hours?\s*[:\-]\s*(.+)$").expect("valid regex")
    });

    let mut findings = Findings::default();

    if let Some((idx, caps)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| LABEL_RE.captures(&l.text).map(|c| (i, c)))
    {
        let name = EMAIL_RE.replace_all(&caps[1], "");
        let name = name
            .split([',', ';', '|', '('])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if !name.is_empty() {
            findings.instructor = Some(Candidate::new(name, 0.9, 2));
        }
        findings.email = lines[idx..]
            .iter()
            .take(CONTACT_BLOCK + 1)
            .find_map(|l| EMAIL_RE.find(&l.text))
            .map(|m| Candidate::new(m.as_str().to_string(), 0.9, 2));
    } else if let Some(m) = lines.iter().find_map(|l| TITLED_NAME_RE.find(&l.text)) {
        findings.instructor = Some(Candidate::new(m.as_str().to_string(), 0.6, 1));
    }

    if findings.email.is_none() {
        findings.email = lines
            .iter()
            .find_map(|l| EMAIL_RE.find(&l.text))
            .map(|m| Candidate::new(m.as_str().to_string(), 0.6, 1));
    }

    findings.office_hours = lines
        .iter()
        .find_map(|l| OFFICE_HOURS_RE.captures(&l.text))
        .map(|caps| Candidate::new(caps[1].trim().to_string(), 0.9, 2));

    findings
}

pub(super) fn credits(lines: &[Line]) -> Findings {
    static LABELLED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\s*(?:credits?|credit\s+hours?|units?)\s*[:\-]\s*(\d+(?:\.\d+)?)\b")
            .expect("valid regex")
    });
    static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*-?\s*(?:credit(?:\s+hours?|s)?|units?)\b")
            .expect("valid regex")
    });

    let plausible = |raw: &str| raw.parse::<f32>().ok().filter(|c| (0.5..=12.0).contains(c));

    let credits = lines
        .iter()
        .find_map(|l| LABELLED_RE.captures(&l.text).and_then(|c| plausible(&c[1])))
        .map(|c| Candidate::new(c, 0.9, 2))
        .or_else(|| {
            lines
                .iter()
                .find_map(|l| INLINE_RE.captures(&l.text).and_then(|c| plausible(&c[1])))
                .map(|c| Candidate::new(c, 0.7, 1))
        });

    Findings {
        credits,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::lines;
    use super::*;

    #[test]
    fn labelled_instructor_block() {
        let f = instructor(&lines(
            "Instructor: Dr. Ada Lovelace, PhD\nOffice: ENG 210\nEmail: ada@uni.edu\nOffice Hours: Tue 2-4pm",
        ));
        assert_eq!(f.instructor.unwrap().value, "Dr. Ada Lovelace");
        assert_eq!(f.email.unwrap().value, "ada@uni.edu");
        assert_eq!(f.office_hours.unwrap().value, "Tue 2-4pm");
    }

    #[test]
    fn titled_name_fallback() {
        let f = instructor(&lines("Welcome! This course is taught this term.\nContact Prof. Grace Hopper with questions at gh@navy.mil"));
        let name = f.instructor.unwrap();
        assert_eq!(name.value, "Prof. Grace Hopper");
        assert_eq!(name.specificity, 1);
        assert_eq!(f.email.unwrap().confidence, 0.6);
    }

    #[test]
    fn credit_hours() {
        assert_eq!(credits(&lines("Credits: 3")).credits.unwrap().value, 3.0);
        let inline = credits(&lines("This is a 4-credit course.")).credits.unwrap();
        assert_eq!(inline.value, 4.0);
        assert_eq!(inline.confidence, 0.7);
        assert!(credits(&lines("Worth 40 credits of effort")).credits.is_none());
    }
}
