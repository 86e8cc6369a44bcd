//! Layout heuristics over extracted text.
//!
//! Syllabus schedules are usually tables. Once flattened to text, a table row
//! shows up as a line with several tab, pipe, or wide-space separated cells.
//! Recording where those rows sit lets the parser treat them as schedule rows
//! instead of prose.

use serde::{Deserialize, Serialize};

/// Minimum consecutive tabular lines that make up a table.
const MIN_TABLE_ROWS: usize = 2;

/// A run of tabular lines on one page (0-based line indices, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRegion {
    /// 1-based page number.
    pub page: u32,
    pub start_line: usize,
    pub end_line: usize,
}

impl TableRegion {
    pub fn contains(&self, page: u32, line: usize) -> bool {
        self.page == page && (self.start_line..=self.end_line).contains(&line)
    }
}

/// Whether a line looks like a row of a flattened table.
pub fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 5 {
        return false;
    }
    if trimmed.matches('\t').count() >= 2 {
        return true;
    }
    if trimmed.matches('|').count() >= 2 {
        return true;
    }
    count_multi_space_gaps(trimmed) >= 2
}

/// Count runs of three or more spaces.
fn count_multi_space_gaps(line: &str) -> usize {
    let mut gaps = 0;
    let mut run = 0;
    for c in line.chars() {
        if c == ' ' {
            run += 1;
        } else {
            if run >= 3 {
                gaps += 1;
            }
            run = 0;
        }
    }
    gaps
}

/// Find runs of at least two consecutive tabular lines in a page of text.
pub fn detect_tables(page: u32, text: &str) -> Vec<TableRegion> {
    let mut regions = Vec::new();
    let mut start: Option<usize> = None;
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        match (is_tabular_line(line), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                push_region(&mut regions, page, s, idx - 1);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        push_region(&mut regions, page, s, lines.len() - 1);
    }
    regions
}

fn push_region(regions: &mut Vec<TableRegion>, page: u32, start: usize, end: usize) {
    if end + 1 - start >= MIN_TABLE_ROWS {
        regions.push(TableRegion {
            page,
            start_line: start,
            end_line: end,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_lines() {
        assert!(is_tabular_line("Week 1\tSep 3\tIntro lecture"));
        assert!(is_tabular_line("| Week | Date | Topic |"));
        assert!(is_tabular_line("Week 2    Sep 10    Quiz 1"));
        assert!(!is_tabular_line("Office hours are held on Tuesdays."));
        assert!(!is_tabular_line("a|b|"));
    }

    #[test]
    fn detects_table_runs() {
        let text = "Schedule\n\
                    Week 1\tSep 3\tIntro\n\
                    Week 2\tSep 10\tQuiz 1\n\
                    Week 3\tSep 17\tLab\n\
                    Grading is described below.\n\
                    Lonely\trow\there\n";
        let tables = detect_tables(1, text);
        assert_eq!(
            tables,
            vec![TableRegion {
                page: 1,
                start_line: 1,
                end_line: 3
            }]
        );
        assert!(tables[0].contains(1, 2));
        assert!(!tables[0].contains(2, 2));
    }

    #[test]
    fn table_running_to_end_of_page() {
        let text = "| a | b |\n| c | d |";
        let tables = detect_tables(3, text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].end_line, 1);
    }
}
