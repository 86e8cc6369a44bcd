//! Text normalization pipeline run before any field recognition.
//!
//! Line-level passes are functions `&str -> String` applied to every line.
//! Document-level passes rewrite the line list (page furniture removal,
//! hyphenation joins, blank-line collapsing). Each line remembers its page and
//! whether the extractor placed it inside a table region.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use syllabus_extract::{ExtractedDocument, is_tabular_line};

/// A normalized line of syllabus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
    /// Table row cells, when the line came from a table region.
    pub cells: Vec<String>,
}

impl Line {
    pub fn is_table_row(&self) -> bool {
        !self.cells.is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Run the full normalization pipeline over an extracted document.
pub fn normalize(doc: &ExtractedDocument) -> Vec<Line> {
    let mut lines = Vec::new();
    for page in &doc.pages {
        for (idx, raw) in page.text.lines().enumerate() {
            let folded = fold_punctuation(raw);
            let cells = if doc.in_table(page.number, idx) || is_tabular_line(&folded) {
                split_cells(&folded)
            } else {
                Vec::new()
            };
            let text = if cells.is_empty() {
                collapse_whitespace(&folded)
            } else {
                cells.join(" | ")
            };
            lines.push(Line {
                page: page.number,
                text,
                cells,
            });
        }
    }

    let lines = strip_page_furniture(lines, doc.pages.len());
    let lines = join_hyphenated(lines);
    collapse_blank_lines(lines)
}

// ---------------------------------------------------------------------------
// Pass 1: Fold unicode punctuation
// ---------------------------------------------------------------------------

/// Map typographic punctuation onto ASCII so patterns stay simple.
fn fold_punctuation(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            '\u{2018}' | '\u{2019}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            '\u{2022}' | '\u{25CF}' | '\u{25AA}' => '*',
            other => other,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Split table rows into cells
// ---------------------------------------------------------------------------

/// Split a tabular line on pipes, tabs, or wide space gaps.
fn split_cells(line: &str) -> Vec<String> {
    static WIDE_GAP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\t+| {3,}").expect("valid regex"));

    let trimmed = line.trim();
    let raw: Vec<&str> = if trimmed.contains('|') {
        trimmed.trim_matches('|').split('|').collect()
    } else {
        WIDE_GAP_RE.split(trimmed).collect()
    };
    let cells: Vec<String> = raw.into_iter().map(collapse_whitespace).collect();

    // Markdown separator rows (|---|---|) carry no content.
    if cells
        .iter()
        .all(|c| c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
    {
        return Vec::new();
    }
    if cells.iter().filter(|c| !c.is_empty()).count() < 2 {
        return Vec::new();
    }
    cells
}

// ---------------------------------------------------------------------------
// Pass 3: Collapse whitespace
// ---------------------------------------------------------------------------

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Pass 4: Remove page furniture
// ---------------------------------------------------------------------------

/// Drop headers/footers: short lines repeated on most pages, and bare page
/// numbers ("3", "Page 3 of 9").
fn strip_page_furniture(lines: Vec<Line>, page_count: usize) -> Vec<Line> {
    static PAGE_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:page\s+)?\d{1,3}(?:\s+of\s+\d{1,3})?$").expect("valid regex")
    });

    let mut repeated: HashMap<String, usize> = HashMap::new();
    if page_count >= 3 {
        let mut seen: HashMap<String, u32> = HashMap::new();
        for line in lines
            .iter()
            .filter(|l| !l.is_blank() && !l.is_table_row() && l.text.len() <= 80)
        {
            let key = furniture_key(&line.text);
            if seen.get(&key) != Some(&line.page) {
                seen.insert(key.clone(), line.page);
                *repeated.entry(key).or_default() += 1;
            }
        }
    }
    let threshold = page_count.div_ceil(2).max(3);

    lines
        .into_iter()
        .filter(|line| {
            if PAGE_NO_RE.is_match(&line.text) {
                return false;
            }
            if line.is_table_row() {
                return true;
            }
            let key = furniture_key(&line.text);
            repeated.get(&key).is_none_or(|&n| n < threshold)
        })
        .collect()
}

/// Page counters vary between otherwise identical headers ("Page 2", "Page 3").
fn furniture_key(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("page") {
        lower.chars().filter(|c| !c.is_ascii_digit()).collect()
    } else {
        lower
    }
}

// ---------------------------------------------------------------------------
// Pass 5: Join hyphenated line breaks
// ---------------------------------------------------------------------------

/// Rejoin words split across lines ("assign-" / "ment due") within a page.
fn join_hyphenated(lines: Vec<Line>) -> Vec<Line> {
    static TRAILING_HYPHEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[A-Za-z]{2,}-$").expect("valid regex"));

    let mut out: Vec<Line> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(prev) = out.last_mut() {
            let continues = prev.page == line.page
                && !prev.is_table_row()
                && !line.is_table_row()
                && TRAILING_HYPHEN_RE.is_match(&prev.text)
                && line.text.starts_with(|c: char| c.is_ascii_lowercase());
            if continues {
                prev.text.pop();
                prev.text.push_str(&line.text);
                continue;
            }
        }
        out.push(line);
    }
    out
}

// ---------------------------------------------------------------------------
// Pass 6: Collapse blank lines
// ---------------------------------------------------------------------------

/// Keep at most one blank line in a row and none at the edges.
fn collapse_blank_lines(lines: Vec<Line>) -> Vec<Line> {
    let mut out: Vec<Line> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.is_blank() && out.last().is_none_or(Line::is_blank) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(Line::is_blank) {
        out.pop();
    }
    out
}
