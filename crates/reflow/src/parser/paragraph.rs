//! Line -> paragraph segmentation.
//!
//! Lines are appended to the open paragraph until it is long enough
//! (`min_paragraph_lines`) and the incoming line shows a break cue:
//!
//! - a height sample strictly larger than every sample of the previous line;
//! - the word "abstract";
//! - a vertical jump of more than twice the line's height;
//! - a first-line indent: the line sits right of its predecessor and the
//!   line after it returns to the left.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Line, Paragraph};

/// Group a page's surviving lines into paragraphs.
pub fn segment_paragraphs(lines: Vec<Line>, min_paragraph_lines: usize) -> Vec<Paragraph> {
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    let mut current: Paragraph = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let breaks = match current.last() {
            Some(prev) if current.len() >= min_paragraph_lines => {
                starts_paragraph(prev, line, lines.get(i + 1))
            }
            _ => false,
        };
        if breaks {
            paragraphs.push(std::mem::take(&mut current));
        }
        current.push(line.clone());
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// Whether `line` opens a new paragraph, ignoring the length threshold.
pub fn starts_paragraph(prev: &Line, line: &Line, next: Option<&Line>) -> bool {
    let font_jump = line
        .height_samples
        .iter()
        .any(|&h| prev.height_samples.iter().all(|&p| h > p));

    let gap = (prev.y - line.y).abs() > line.height * 2.0;

    let indented = line.x > prev.x && next.is_some_and(|n| n.x < line.x);

    font_jump || is_abstract(&line.text) || gap || indented
}

fn is_abstract(text: &str) -> bool {
    static RE_ABSTRACT: OnceLock<Regex> = OnceLock::new();
    RE_ABSTRACT
        .get_or_init(|| Regex::new(r"(?i)abstract").unwrap())
        .is_match(text)
}
