//! Date and time-of-day recognition.
//!
//! Times are found first and masked out so that `10:00-11:00` never reads as
//! a date range and `Oct 14 - 2pm` never reads as `Oct 14-2`.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime, Weekday};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use syllabus_shared::TimeWindow;

/// A recognised date, possibly still missing its year or its calendar anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DateSpec {
    /// Fully specified calendar date.
    Absolute { date: NaiveDate },
    /// Month and day without a year (`Oct 14`, `10/14`).
    Partial { month: u32, day: u32 },
    /// Teaching-week reference (`Week 5 Tuesday`). Week 1 contains the
    /// semester start; a missing weekday means the first day of that week.
    Relative { week: u32, weekday: Option<Weekday> },
}

impl DateSpec {
    pub fn absolute(&self) -> Option<NaiveDate> {
        match self {
            Self::Absolute { date } => Some(*date),
            _ => None,
        }
    }
}

/// Month (1-12) for an English month name or abbreviation.
pub fn parse_month(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Weekday for an English day name or abbreviation (`Tue`, `Thurs`, `friday`).
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    match prefix {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn valid_month_day(month: u32, day: u32) -> bool {
    // 2000 is a leap year, so Feb 29 is accepted until a year is known.
    NaiveDate::from_ymd_opt(2000, month, day).is_some()
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    match raw.len() {
        2 => Some(2000 + year),
        4 if (1900..=2200).contains(&year) => Some(year),
        _ => None,
    }
}

fn spec(year: Option<i32>, month: u32, day: u32) -> Option<DateSpec> {
    if !valid_month_day(month, day) {
        return None;
    }
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day).map(|date| DateSpec::Absolute { date }),
        None => Some(DateSpec::Partial { month, day }),
    }
}

// ---------------------------------------------------------------------------
// Times
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

fn meridiem(raw: Option<&str>) -> Option<Meridiem> {
    let raw = raw?.replace('.', "").to_ascii_lowercase();
    match raw.as_str() {
        "am" | "a" => Some(Meridiem::Am),
        "pm" | "p" => Some(Meridiem::Pm),
        _ => None,
    }
}

fn hour24(hour: u32, mer: Option<Meridiem>) -> Option<u32> {
    match mer {
        None if hour <= 23 => Some(hour),
        Some(_) if hour == 0 || hour > 12 => None,
        Some(Meridiem::Am) => Some(hour % 12),
        Some(Meridiem::Pm) => Some(hour % 12 + 12),
        None => None,
    }
}

fn time(hour: u32, minute: u32, mer: Option<Meridiem>) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour24(hour, mer)?, minute, 0)
}

fn num(caps: &Captures, idx: usize) -> Option<u32> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

fn boundary_after(text: &str, end: usize) -> bool {
    !text[end..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?::(\d{2}))?(?:\s*([ap]m\b|[ap]\.m\.?))?\s*(?:-|to)\s*(\d{1,2})(?::(\d{2}))?(?:\s*([ap]m\b|[ap]\.m\.?))?",
    )
    .expect("valid regex")
});

static TIME_POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}):(\d{2})(?:\s*([ap]m\b|[ap]\.m\.?))?|\b(\d{1,2})\s*([ap]m\b|[ap]\.m\.?)",
    )
    .expect("valid regex")
});

fn range_window(caps: &Captures) -> Option<TimeWindow> {
    let (h1, h2) = (num(caps, 1)?, num(caps, 4)?);
    let (m1, m2) = (num(caps, 2).unwrap_or(0), num(caps, 5).unwrap_or(0));
    let has_minutes = caps.get(2).is_some() || caps.get(5).is_some();
    let (mer1, mer2) = (
        meridiem(caps.get(3).map(|m| m.as_str())),
        meridiem(caps.get(6).map(|m| m.as_str())),
    );

    let (start, end) = match (mer1, mer2) {
        (Some(a), Some(b)) => (time(h1, m1, Some(a))?, time(h2, m2, Some(b))?),
        (None, Some(b)) => {
            if caps.get(2).is_none() && h1 > 12 {
                return None;
            }
            let end = time(h2, m2, Some(b))?;
            let start = time(h1, m1, Some(b))?;
            if start > end {
                let flipped = if b == Meridiem::Pm { Meridiem::Am } else { Meridiem::Pm };
                (time(h1, m1, Some(flipped))?, end)
            } else {
                (start, end)
            }
        }
        (Some(a), None) => {
            let start = time(h1, m1, Some(a))?;
            let end = time(h2, m2, Some(a))?;
            if end < start {
                (start, time(h2, m2, Some(Meridiem::Pm))?)
            } else {
                (start, end)
            }
        }
        (None, None) => {
            if !has_minutes {
                return None;
            }
            // Bare class-hour ranges: 1:00-2:15 means the afternoon.
            let h1 = if h1 < 7 { h1 + 12 } else { h1 };
            let h2 = if h2 < 7 { h2 + 12 } else { h2 };
            (time(h1, m1, None)?, time(h2, m2, None)?)
        }
    };
    Some(TimeWindow::new(start, end))
}

fn point_window(caps: &Captures) -> Option<TimeWindow> {
    if caps.get(1).is_some() {
        let mer = meridiem(caps.get(3).map(|m| m.as_str()));
        let t = time(num(caps, 1)?, num(caps, 2)?, mer)?;
        Some(TimeWindow::at(t))
    } else {
        let mer = meridiem(caps.get(5).map(|m| m.as_str()));
        let t = time(num(caps, 4)?, 0, mer)?;
        Some(TimeWindow::at(t))
    }
}

/// All time-of-day mentions in `text`, in order of appearance.
pub fn find_times(text: &str) -> Vec<(TimeWindow, Range<usize>)> {
    let mut found: Vec<(TimeWindow, Range<usize>)> = Vec::new();
    scan(&TIME_RANGE_RE, text, |caps, whole| {
        if !boundary_after(text, whole.end)
            || (caps.get(2).is_none() && follows_item_label(text, whole.start))
        {
            return false;
        }
        match range_window(caps) {
            Some(window) => {
                found.push((window, whole));
                true
            }
            None => false,
        }
    });
    scan(&TIME_POINT_RE, text, |caps, whole| {
        if !boundary_after(text, whole.end) || overlaps_any(&found, &whole) {
            return false;
        }
        match point_window(caps) {
            Some(window) => {
                found.push((window, whole));
                true
            }
            None => false,
        }
    });
    found.sort_by_key(|(_, r)| r.start);
    found
}

/// Walk matches of `re`; a rejected match resumes one char later instead of
/// after the whole match, so `Exam 2 - 9:00-10:15` still finds `9:00-10:15`.
fn scan(re: &Regex, text: &str, mut accept: impl FnMut(&Captures, Range<usize>) -> bool) {
    let mut pos = 0;
    while pos <= text.len() {
        let Some(caps) = re.captures_at(text, pos) else {
            break;
        };
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        pos = if accept(&caps, whole.clone()) && whole.end > whole.start {
            whole.end
        } else {
            whole.start + text[whole.start..].chars().next().map_or(1, char::len_utf8)
        };
    }
}

/// First time-of-day mention in `text`.
pub fn find_time(text: &str) -> Option<TimeWindow> {
    find_times(text).into_iter().next().map(|(w, _)| w)
}

/// `Quiz 1 - 10:30am` is a numbered item followed by a time, not a range.
fn follows_item_label(text: &str, start: usize) -> bool {
    const LABELS: &[&str] = &[
        "exam", "quiz", "test", "midterm", "homework", "hw", "assignment", "lab", "project",
        "week", "chapter", "ch", "unit", "part", "set", "lecture", "module", "section",
    ];
    text[..start]
        .trim_end()
        .rsplit(|c: char| !c.is_ascii_alphabetic())
        .next()
        .is_some_and(|w| LABELS.contains(&w.to_ascii_lowercase().as_str()))
}

fn overlaps_any<T>(found: &[(T, Range<usize>)], range: &Range<usize>) -> bool {
    found
        .iter()
        .any(|(_, r)| r.start < range.end && range.start < r.end)
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const MONTH: &str = r"(Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sept?(?:ember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").expect("valid regex")
});

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:\s*-\s*\d{{1,2}}(?:st|nd|rd|th)?\b)?(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b\.?(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

static WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bweek\s*#?\s*(\d{1,2})\b(?:\s*[,:(|-]?\s*(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?\)?)?",
    )
    .expect("valid regex")
});

/// All dates mentioned in `text`, in order of appearance.
///
/// Overlapping matches keep the earliest, then longest, candidate.
pub fn find_dates(text: &str) -> Vec<(DateSpec, Range<usize>)> {
    let masked = mask(text, find_times(text).iter().map(|(_, r)| r.clone()));
    let mut candidates: Vec<(DateSpec, Range<usize>)> = Vec::new();

    for caps in ISO_RE.captures_iter(&masked) {
        let (Some(y), Some(m), Some(d)) = (num(&caps, 1), num(&caps, 2), num(&caps, 3)) else {
            continue;
        };
        if let Some(s) = spec(Some(y as i32), m, d) {
            candidates.push((s, caps.get(0).map(|m| m.range()).unwrap_or_default()));
        }
    }
    for caps in NUMERIC_RE.captures_iter(&masked) {
        let (Some(m), Some(d)) = (num(&caps, 1), num(&caps, 2)) else {
            continue;
        };
        let year = match caps.get(3) {
            Some(raw) => match expand_year(raw.as_str()) {
                Some(y) => Some(y),
                None => continue,
            },
            None => None,
        };
        if let Some(s) = spec(year, m, d) {
            candidates.push((s, caps.get(0).map(|m| m.range()).unwrap_or_default()));
        }
    }
    for caps in MONTH_DAY_RE.captures_iter(&masked) {
        let Some(month) = caps.get(1).and_then(|m| parse_month(m.as_str())) else {
            continue;
        };
        let Some(day) = num(&caps, 2) else { continue };
        let year = caps.get(3).and_then(|y| expand_year(y.as_str()));
        if let Some(s) = spec(year, month, day) {
            candidates.push((s, caps.get(0).map(|m| m.range()).unwrap_or_default()));
        }
    }
    for caps in DAY_MONTH_RE.captures_iter(&masked) {
        let Some(day) = num(&caps, 1) else { continue };
        let Some(month) = caps.get(2).and_then(|m| parse_month(m.as_str())) else {
            continue;
        };
        let year = caps.get(3).and_then(|y| expand_year(y.as_str()));
        if let Some(s) = spec(year, month, day) {
            candidates.push((s, caps.get(0).map(|m| m.range()).unwrap_or_default()));
        }
    }
    for caps in WEEK_RE.captures_iter(&masked) {
        let Some(week) = num(&caps, 1).filter(|w| (1..=30).contains(w)) else {
            continue;
        };
        let weekday = caps.get(2).and_then(|w| parse_weekday(w.as_str()));
        candidates.push((
            DateSpec::Relative { week, weekday },
            caps.get(0).map(|m| m.range()).unwrap_or_default(),
        ));
    }

    candidates.sort_by(|a, b| {
        a.1.start
            .cmp(&b.1.start)
            .then_with(|| (b.1.end - b.1.start).cmp(&(a.1.end - a.1.start)))
    });
    let mut kept: Vec<(DateSpec, Range<usize>)> = Vec::new();
    for (spec, range) in candidates {
        if !overlaps_any(&kept, &range) {
            kept.push((spec, range));
        }
    }
    kept
}

/// Replace byte ranges with spaces, preserving offsets.
fn mask(text: &str, ranges: impl Iterator<Item = Range<usize>>) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for range in ranges {
        for b in &mut bytes[range] {
            *b = b' ';
        }
    }
    // Ranges sit on char boundaries and whole chars become spaces, so the
    // result stays valid UTF-8.
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}
