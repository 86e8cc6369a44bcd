use std::io::{Cursor, Read};

use roxmltree::Node;
use syllabus_shared::{Result, SyllabusError};

use super::{FormatExtractor, RawPage};
use crate::format::DocumentFormat;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCUMENT_PART: &str = "word/document.xml";

/// Word-processor documents (`.docx`): `word/document.xml` out of the zip
/// container, walked paragraph by paragraph. Tables become pipe rows.
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<RawPage>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SyllabusError::Extraction(format!("invalid docx container: {e}")))?;

        let mut xml = String::new();
        {
            let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
                zip::result::ZipError::UnsupportedArchive(msg) if msg.contains("assword") => {
                    SyllabusError::unsupported("docx", "document is encrypted")
                }
                e => SyllabusError::Extraction(format!("missing {DOCUMENT_PART}: {e}")),
            })?;
            part.read_to_string(&mut xml)
                .map_err(|e| SyllabusError::Extraction(format!("read {DOCUMENT_PART}: {e}")))?;
        }

        let doc = roxmltree::Document::parse(&xml)
            .map_err(|e| SyllabusError::Extraction(format!("malformed document xml: {e}")))?;

        let mut out = PageWriter::default();
        match doc
            .root_element()
            .children()
            .find(|n| n.has_tag_name((W_NS, "body")))
        {
            Some(body) => walk_block(body, &mut out),
            None => return Err(SyllabusError::Extraction("document has no body".into())),
        }
        Ok(out.finish())
    }

    fn name(&self) -> &str {
        "docx"
    }
}

// ---------------------------------------------------------------------------
// Tree walking
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PageWriter {
    pages: Vec<String>,
    current: String,
}

impl PageWriter {
    fn line(&mut self, text: &str) {
        self.current.push_str(text);
        self.current.push('\n');
    }

    fn page_break(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
    }

    fn finish(mut self) -> Vec<RawPage> {
        self.pages.push(self.current);
        self.pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| RawPage {
                number: i as u32 + 1,
                text,
            })
            .collect()
    }
}

fn is_w(node: &Node, name: &str) -> bool {
    node.has_tag_name((W_NS, name))
}

/// Walk block-level content (body, cells, content controls).
fn walk_block(node: Node, out: &mut PageWriter) {
    for child in node.children().filter(|n| n.is_element()) {
        if is_w(&child, "p") {
            paragraph(child, out);
        } else if is_w(&child, "tbl") {
            table(child, out);
        } else if !is_w(&child, "sectPr") {
            walk_block(child, out);
        }
    }
}

fn paragraph(node: Node, out: &mut PageWriter) {
    let break_before = node
        .children()
        .find(|n| is_w(n, "pPr"))
        .is_some_and(|ppr| ppr.children().any(|n| is_w(&n, "pageBreakBefore")));
    if break_before && !out.current.is_empty() {
        out.page_break();
    }

    let mut text = String::new();
    let mut broke = false;
    for n in node.descendants().filter(|n| n.is_element()) {
        if is_w(&n, "t") {
            text.push_str(n.text().unwrap_or_default());
        } else if is_w(&n, "tab") && !n.ancestors().any(|a| is_w(&a, "pPr")) {
            text.push('\t');
        } else if is_w(&n, "br") || is_w(&n, "cr") {
            if n.attribute((W_NS, "type")) == Some("page") {
                if !text.is_empty() {
                    out.line(&text);
                    text.clear();
                }
                out.page_break();
                broke = true;
            } else {
                text.push('\n');
            }
        }
    }
    if !(broke && text.is_empty()) {
        out.line(&text);
    }
}

fn table(node: Node, out: &mut PageWriter) {
    for row in node.children().filter(|n| is_w(n, "tr")) {
        let cells: Vec<String> = row
            .children()
            .filter(|n| is_w(n, "tc"))
            .map(cell_text)
            .collect();
        if cells.is_empty() {
            continue;
        }
        out.line(&format!("| {} |", cells.join(" | ")));
    }
}

fn cell_text(cell: Node) -> String {
    let mut parts = Vec::new();
    for p in cell.descendants().filter(|n| is_w(n, "p")) {
        let text: String = p
            .descendants()
            .filter(|n| is_w(n, "t"))
            .filter_map(|n| n.text())
            .collect();
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }
    parts.join(" ")
}
