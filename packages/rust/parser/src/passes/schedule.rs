//! Weekly meeting pattern recognition (`Lectures: MWF 10:00-10:50, Room 204`).

use std::sync::LazyLock;

use chrono::Weekday;
use regex::Regex;
use syllabus_shared::MeetingPattern;

use super::{Candidate, Findings};
use crate::dates::{find_dates, find_times, parse_weekday};
use crate::normalize::Line;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:lectures?|class(?:es)?|meeting\s+times?|meets|class\s+schedule|lab|discussion|recitation|section|time|days?)\b",
    )
    .expect("valid regex")
});

/// Compact day codes: `MWF`, `TTh`, `TR`, `MW`.
static COMPACT_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:M|Tu|Th|T|W|R|F|Sa|Su|S|U){2,7}\b").expect("valid regex"));

static OFFICE_HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\boffice\s+hours?\b").expect("valid regex"));

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\blocation\s*:?\s*|\bin\s+|\bat\s+)(.+)$|\b((?:room|rm\.?|bldg\.?|building|hall)\s+.+)$",
    )
    .expect("valid regex")
});

fn push_day(days: &mut Vec<Weekday>, day: Weekday) {
    if !days.contains(&day) {
        days.push(day);
    }
}

fn parse_compact(code: &str) -> Vec<Weekday> {
    let mut days = Vec::new();
    let mut rest = code;
    while !rest.is_empty() {
        let (day, len) = match rest {
            r if r.starts_with("Tu") => (Weekday::Tue, 2),
            r if r.starts_with("Th") => (Weekday::Thu, 2),
            r if r.starts_with("Sa") => (Weekday::Sat, 2),
            r if r.starts_with("Su") => (Weekday::Sun, 2),
            r if r.starts_with('M') => (Weekday::Mon, 1),
            r if r.starts_with('T') => (Weekday::Tue, 1),
            r if r.starts_with('W') => (Weekday::Wed, 1),
            r if r.starts_with('R') => (Weekday::Thu, 1),
            r if r.starts_with('F') => (Weekday::Fri, 1),
            r if r.starts_with('S') => (Weekday::Sat, 1),
            r if r.starts_with('U') => (Weekday::Sun, 1),
            _ => break,
        };
        push_day(&mut days, day);
        rest = &rest[len..];
    }
    days
}

/// Weekdays named in `text`, either spelled out (`Mon/Wed`, `Tuesdays`) or
/// as a compact code (`MWF`).
pub(super) fn parse_days(text: &str) -> Vec<Weekday> {
    const FULL: [(&str, Weekday); 7] = [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];

    let mut days = Vec::new();
    for word in WORD_RE.find_iter(text).map(|m| m.as_str()) {
        let lower = word.to_ascii_lowercase();
        let stem = lower.strip_suffix('s').unwrap_or(&lower);
        if stem.len() < 3 {
            continue;
        }
        let Some(day) = parse_weekday(stem) else {
            continue;
        };
        if FULL.iter().any(|(full, d)| *d == day && full.starts_with(stem)) {
            push_day(&mut days, day);
        }
    }
    if days.is_empty() {
        for m in COMPACT_DAYS_RE.find_iter(text) {
            for day in parse_compact(m.as_str()) {
                push_day(&mut days, day);
            }
        }
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    days
}

fn location(after_time: &str) -> Option<String> {
    let caps = LOCATION_RE.captures(after_time)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let cleaned = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')'))
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

pub(super) fn meeting_times(lines: &[Line]) -> Findings {
    let mut patterns: Vec<MeetingPattern> = Vec::new();
    let mut labelled = false;

    for line in lines {
        // Dated lines are events, not a weekly pattern.
        if OFFICE_HOURS_RE.is_match(&line.text) || !find_dates(&line.text).is_empty() {
            continue;
        }
        let Some((window, span)) = find_times(&line.text)
            .into_iter()
            .find(|(w, _)| w.start != w.end)
        else {
            continue;
        };
        let days = parse_days(&line.text[..span.start]);
        let days = if days.is_empty() {
            parse_days(&line.text)
        } else {
            days
        };
        if days.is_empty() {
            continue;
        }

        labelled |= LABEL_RE.is_match(&line.text);
        let pattern = MeetingPattern {
            days,
            start: window.start,
            end: window.end,
            location: location(&line.text[span.end..]),
        };
        if !patterns
            .iter()
            .any(|p| p.days == pattern.days && p.start == pattern.start && p.end == pattern.end)
        {
            patterns.push(pattern);
        }
    }

    if patterns.is_empty() {
        return Findings::default();
    }
    let (confidence, specificity) = if labelled { (0.9, 2) } else { (0.7, 1) };
    Findings {
        schedule: Some(Candidate::new(patterns, confidence, specificity)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::super::lines;
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_parsing() {
        use Weekday::*;
        assert_eq!(parse_days("MWF"), vec![Mon, Wed, Fri]);
        assert_eq!(parse_days("TTh"), vec![Tue, Thu]);
        assert_eq!(parse_days("TR"), vec![Tue, Thu]);
        assert_eq!(parse_days("Mon/Wed"), vec![Mon, Wed]);
        assert_eq!(parse_days("Tuesdays and Thursdays"), vec![Tue, Thu]);
        assert!(parse_days("Monitor the forum").is_empty());
    }

    #[test]
    fn labelled_lecture_line() {
        let f = meeting_times(&lines("Lectures: MWF 10:00-10:50 AM, Room 204 Smith Hall"));
        let schedule = f.schedule.unwrap();
        assert_eq!(schedule.specificity, 2);
        let p = &schedule.value[0];
        assert_eq!(p.days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert_eq!((p.start, p.end), (t(10, 0), t(10, 50)));
        assert_eq!(p.location.as_deref(), Some("Room 204 Smith Hall"));
    }

    #[test]
    fn multiple_patterns() {
        let f = meeting_times(&lines(
            "Tuesday and Thursday 1:00-2:15 in ENG 101\nLab: Fri 3pm-5pm",
        ));
        let schedule = f.schedule.unwrap().value;
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule[0].start, t(13, 0));
        assert_eq!(schedule[0].location.as_deref(), Some("ENG 101"));
        assert_eq!(schedule[1].days, vec![Weekday::Fri]);
    }

    #[test]
    fn dated_lines_are_not_patterns() {
        let f = meeting_times(&lines("Midterm: Tue Oct 14 10:00-11:00"));
        assert!(f.schedule.is_none());
    }

    #[test]
    fn office_hours_are_not_patterns() {
        let f = meeting_times(&lines("Office Hours: Tue 2-4pm"));
        assert!(f.schedule.is_none());
    }
}
