//! Bibliography / acknowledgement cut-off.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Line;

/// What [`truncate_references`] did to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// No heading found; the page is untouched.
    None,
    /// A heading was found early in the document: the page was cut at the
    /// given line index but later pages are still read.
    Page(usize),
    /// A heading was found deep enough to be the real end of the content:
    /// the page was cut and no further pages should be fetched.
    EndOfContent(usize),
}

impl Truncation {
    pub fn stops_document(&self) -> bool {
        matches!(self, Truncation::EndOfContent(_))
    }
}

/// `true` if the trimmed line ends in a references/acknowledgements heading.
pub fn is_reference_heading(text: &str) -> bool {
    static RE_HEADING: OnceLock<Regex> = OnceLock::new();
    let re = RE_HEADING
        .get_or_init(|| Regex::new(r"(?i)(r?eferences?|acknowledgements)$").unwrap());
    re.is_match(text.trim())
}

/// Cut `lines` at the first reference heading.
///
/// `page_index / page_count >= depth` decides whether the heading ends the
/// whole document or only this page.
pub fn truncate_references(
    lines: &mut Vec<Line>,
    page_index: usize,
    page_count: usize,
    depth: f32,
) -> Truncation {
    let Some(index) = lines.iter().position(|l| is_reference_heading(&l.text)) else {
        return Truncation::None;
    };
    lines.truncate(index);

    let relative = if page_count == 0 {
        0.0
    } else {
        page_index as f32 / page_count as f32
    };

    if relative >= depth {
        Truncation::EndOfContent(index)
    } else {
        Truncation::Page(index)
    }
}
