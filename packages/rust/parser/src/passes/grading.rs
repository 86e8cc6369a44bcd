//! Grading breakdown recognition.
//!
//! A grading section is a heading ("Grading", "Grade Breakdown", ...) followed
//! by `component ... NN%` rows, either as prose lines or table rows. Without a
//! heading, a run of percentage table rows still counts, at lower confidence.

use std::sync::LazyLock;

use regex::Regex;
use syllabus_shared::GradingComponent;

use super::{Candidate, Findings};
use crate::normalize::Line;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:grading(?:\s+policy|\s+scheme)?|grade\s+(?:breakdown|distribution|weights?|composition)|evaluation|assessments?|course\s+grade)\b",
    )
    .expect("valid regex")
});

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[*\-]?\s*(.+?)[\s.:\-]*\(?(\d{1,3}(?:\.\d+)?)\s*%\)?\s*$").expect("valid regex")
});

static WEIGHT_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(\d{1,3}(?:\.\d+)?)\s*(%?)\)?$").expect("valid regex")
});

/// Parse one grading row. Table rows need a name cell and a weight cell;
/// bare numbers count as weights only under a heading.
fn component(line: &Line, under_heading: bool) -> Option<GradingComponent> {
    let (name, weight) = if line.is_table_row() {
        let mut name = None;
        let mut weight = None;
        for cell in &line.cells {
            match WEIGHT_CELL_RE.captures(cell) {
                Some(caps) if under_heading || !caps[2].is_empty() => {
                    weight = weight.or_else(|| caps[1].parse::<f32>().ok());
                }
                _ if name.is_none() && cell.chars().any(char::is_alphabetic) => {
                    name = Some(cell.clone());
                }
                _ => {}
            }
        }
        (name?, weight?)
    } else {
        let caps = ROW_RE.captures(&line.text)?;
        (caps[1].to_string(), caps[2].parse::<f32>().ok()?)
    };

    let name = name.trim().trim_end_matches(':').trim().to_string();
    let lower = name.to_lowercase();
    if name.len() > 60
        || !name.chars().any(char::is_alphabetic)
        || lower.starts_with("total")
        || !(0.0..=100.0).contains(&weight)
        || weight == 0.0
    {
        return None;
    }
    Some(GradingComponent { name, weight })
}

/// Rows following a heading at `start`, tolerating single blank lines.
fn section(lines: &[Line], start: usize) -> Vec<GradingComponent> {
    let mut found = Vec::new();
    let mut misses = 0;
    for line in &lines[start + 1..] {
        if line.is_blank() {
            continue;
        }
        match component(line, true) {
            Some(c) => {
                found.push(c);
                misses = 0;
            }
            None => {
                misses += 1;
                // Allow a column-header row before the first component.
                if !found.is_empty() || misses > 2 {
                    break;
                }
            }
        }
    }
    found
}

pub(super) fn components(lines: &[Line]) -> Findings {
    for (idx, line) in lines.iter().enumerate() {
        if !HEADING_RE.is_match(&line.text) {
            continue;
        }
        let found = section(lines, idx);
        if !found.is_empty() {
            return Findings {
                grading: Some(Candidate::new(found, 0.9, 2)),
                ..Default::default()
            };
        }
    }

    // No heading: the longest run of consecutive percentage table rows.
    let mut best: Vec<GradingComponent> = Vec::new();
    let mut run: Vec<GradingComponent> = Vec::new();
    for line in lines {
        match line.is_table_row().then(|| component(line, false)).flatten() {
            Some(c) => run.push(c),
            None => {
                if run.len() > best.len() {
                    best = std::mem::take(&mut run);
                }
                run.clear();
            }
        }
    }
    if run.len() > best.len() {
        best = run;
    }

    if best.len() < 2 {
        return Findings::default();
    }
    Findings {
        grading: Some(Candidate::new(best, 0.6, 1)),
        ..Default::default()
    }
}

/// Sum of all weights, for the 100% sanity check.
pub fn total_weight(grading: &[GradingComponent]) -> f32 {
    grading.iter().map(|c| c.weight).sum()
}
