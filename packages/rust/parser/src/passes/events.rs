//! Dated event recognition: any line (or table row) carrying both a date and
//! an obligation keyword becomes one candidate event per date.

use std::sync::LazyLock;

use regex::Regex;

use super::Findings;
use crate::CandidateEvent;
use crate::dates::{DateSpec, find_dates, find_times};
use crate::normalize::Line;

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(final\s+exam(?:ination)?s?|mid-?terms?|exam(?:ination)?s?|quiz(?:zes)?|tests?|final|projects?|presentations?|proposals?|papers?|lab\s+reports?|reports?|homeworks?|hw\s*\d*|problem\s+sets?|psets?|assignments?|labs?|essays?|worksheets?|exercises?|no\s+class(?:es)?|holidays?|break|add/drop|drop|withdraw(?:al)?|registration|reading\s+days?|last\s+day|due)\b",
    )
    .expect("valid regex")
});

/// How strongly a keyword signals its event kind. Lower ranks win when a line
/// holds several keywords ("Final project due" is a project, not an exam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Exam,
    Project,
    Assignment,
    BareFinal,
    Administrative,
    BareDue,
}

/// Canonical keyword for a matched token.
fn canonical(token: &str) -> (&'static str, Rank) {
    let lower = token.to_ascii_lowercase();
    let t = lower.as_str();
    match t {
        _ if t.starts_with("final") && t.contains("exam") => ("final exam", Rank::Exam),
        _ if t.starts_with("mid") => ("midterm", Rank::Exam),
        _ if t.starts_with("exam") => ("exam", Rank::Exam),
        _ if t.starts_with("quiz") => ("quiz", Rank::Exam),
        _ if t.starts_with("test") => ("test", Rank::Exam),
        "final" => ("final", Rank::BareFinal),
        _ if t.starts_with("project") => ("project", Rank::Project),
        _ if t.starts_with("presentation") => ("presentation", Rank::Project),
        _ if t.starts_with("proposal") => ("proposal", Rank::Project),
        _ if t.starts_with("paper") => ("paper", Rank::Project),
        _ if t.starts_with("lab") && t.contains("report") => ("lab report", Rank::Assignment),
        _ if t.starts_with("report") => ("report", Rank::Project),
        _ if t.starts_with("homework") || t.starts_with("hw") => ("homework", Rank::Assignment),
        _ if t.starts_with("problem") || t.starts_with("pset") => ("problem set", Rank::Assignment),
        _ if t.starts_with("assignment") => ("assignment", Rank::Assignment),
        _ if t.starts_with("lab") => ("lab", Rank::Assignment),
        _ if t.starts_with("essay") => ("essay", Rank::Assignment),
        _ if t.starts_with("worksheet") => ("worksheet", Rank::Assignment),
        _ if t.starts_with("exercise") => ("exercise", Rank::Assignment),
        _ if t.starts_with("no") => ("no class", Rank::Administrative),
        _ if t.starts_with("holiday") => ("holiday", Rank::Administrative),
        "break" => ("break", Rank::Administrative),
        _ if t.contains("drop") => ("drop", Rank::Administrative),
        _ if t.starts_with("withdraw") => ("withdraw", Rank::Administrative),
        "registration" => ("registration", Rank::Administrative),
        _ if t.starts_with("reading") => ("reading day", Rank::Administrative),
        _ if t.starts_with("last") => ("last day", Rank::Administrative),
        _ => ("due", Rank::BareDue),
    }
}

/// Strongest obligation keyword in `text`, if any.
pub(crate) fn classify_keyword(text: &str) -> Option<&'static str> {
    KEYWORD_RE
        .find_iter(text)
        .map(|m| canonical(m.as_str()))
        .min_by_key(|(_, rank)| *rank)
        .map(|(kw, _)| kw)
}

fn is_strong(keyword: &str) -> bool {
    !matches!(keyword, "final" | "due" | "test" | "report" | "break" | "lab")
}

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)(?:day|sday|nesday|rsday|urday)?\b\.?,?",
    )
    .expect("valid regex")
});

/// The obligation named by `text`. When the keyword comes before the first
/// date or time, whatever trails it (locations, notes) is dropped.
fn clean_title(text: &str) -> String {
    let mut spans: Vec<std::ops::Range<usize>> =
        find_dates(text).into_iter().map(|(_, r)| r).collect();
    spans.extend(find_times(text).into_iter().map(|(_, r)| r));

    if let Some(first) = spans.iter().map(|r| r.start).min() {
        let head = &text[..first];
        if KEYWORD_RE.is_match(head) {
            let title = strip_title(head, Vec::new());
            if !title.is_empty() {
                return title;
            }
        }
    }
    strip_title(text, spans)
}

/// Remove `spans` and weekday names, then trim filler around what is left.
fn strip_title(text: &str, mut spans: Vec<std::ops::Range<usize>>) -> String {
    const FILLER: &[&str] = &["due", "on", "by", "at", "and", "or", "&", "date", "week"];

    spans.sort_by_key(|r| std::cmp::Reverse(r.start));

    let mut title = text.to_string();
    for span in spans {
        if title.is_char_boundary(span.start) && title.is_char_boundary(span.end) {
            title.replace_range(span, " ");
        }
    }
    let title = WEEKDAY_RE.replace_all(&title, " ");

    let mut words: Vec<&str> = title.split_whitespace().collect();
    let is_noise = |w: &str| {
        let bare = w.trim_matches(|c: char| !c.is_alphanumeric() && c != '&');
        bare.is_empty() || FILLER.contains(&bare.to_lowercase().as_str())
    };
    while words.first().is_some_and(|w| is_noise(w)) {
        words.remove(0);
    }
    while words.last().is_some_and(|w| is_noise(w)) {
        words.pop();
    }
    words
        .join(" ")
        .trim_matches(|c: char| matches!(c, ':' | '-' | ',' | ';' | '|' | '(' | ')'))
        .trim()
        .to_string()
}

/// The title source for a line: the table cell naming the obligation, or the
/// whole line.
fn title_source(line: &Line) -> &str {
    line.cells
        .iter()
        .find(|c| KEYWORD_RE.is_match(c) && !clean_title(c).is_empty())
        .map(String::as_str)
        .unwrap_or(&line.text)
}

fn confidence(date: &DateSpec, keyword: &str, table_row: bool, timed: bool) -> f32 {
    let mut score: f32 = 0.4;
    score += match date {
        DateSpec::Absolute { .. } => 0.25,
        DateSpec::Partial { .. } => 0.15,
        DateSpec::Relative { weekday: Some(_), .. } => 0.05,
        DateSpec::Relative { weekday: None, .. } => 0.0,
    };
    score += if is_strong(keyword) { 0.2 } else { 0.1 };
    if table_row {
        score += 0.1;
    }
    if timed {
        score += 0.05;
    }
    score.min(1.0)
}

fn capitalize(keyword: &str) -> String {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(super) fn dated_events(lines: &[Line]) -> Findings {
    let mut events = Vec::new();
    for line in lines {
        let dates = find_dates(&line.text);
        if dates.is_empty() {
            continue;
        }
        let Some(keyword) = classify_keyword(&line.text) else {
            continue;
        };

        let time = find_times(&line.text).into_iter().next().map(|(w, _)| w);
        let title = match clean_title(title_source(line)) {
            t if t.is_empty() => capitalize(keyword),
            t => t,
        };

        for (date, _) in dates {
            events.push(CandidateEvent {
                keyword: keyword.to_string(),
                title: title.clone(),
                date,
                time,
                confidence: confidence(&date, keyword, line.is_table_row(), time.is_some()),
                page: line.page,
            });
        }
    }
    Findings {
        events,
        ..Default::default()
    }
}
