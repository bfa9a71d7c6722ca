//! Paragraph -> [`TextBlock`] assembly.

use crate::config::{HeadingJoin, ReflowOptions};
use crate::render::cleanup::{collapse_whitespace, normalize_glyphs};
use crate::types::{BBox, Line, Paragraph, TextBlock};

/// Union of the member lines' boxes, or `None` for an empty paragraph.
pub fn paragraph_bbox(lines: &[Line]) -> Option<BBox> {
    let mut iter = lines.iter().map(Line::bbox);
    let first = iter.next()?;
    Some(iter.fold(first, |acc, b| acc.union(&b)))
}

/// Concatenate line texts.
///
/// Lines are separated by a space unless the line ends in a hyphen (the
/// hyphen is kept; words are not re-joined).  When a line is taller than the
/// line after it, `heading_join` decides what happens to the text so far.
/// `Newline` keeps a space after the break so the words stay apart once
/// [`collapse_whitespace`] drops the newline.
pub fn join_lines(lines: &[Line], heading_join: HeadingJoin) -> String {
    let mut text = String::new();

    for (j, line) in lines.iter().enumerate() {
        text.push_str(&line.text);
        match lines.get(j + 1) {
            Some(next) if line.height > next.height => match heading_join {
                HeadingJoin::Newline => text.push_str("\n "),
                HeadingJoin::Replace => {
                    text.clear();
                    text.push('\n');
                }
            },
            Some(_) if !line.text.ends_with('-') => text.push(' '),
            _ => {}
        }
    }

    text
}

/// Build the output block for one paragraph; `None` if its text cleans up
/// to nothing.
pub fn assemble_paragraph(
    paragraph: &Paragraph,
    page: usize,
    source_key: &str,
    options: &ReflowOptions,
) -> Option<TextBlock> {
    let bbox = paragraph_bbox(paragraph)?;

    let mut content = join_lines(paragraph, options.heading_join);
    if options.normalize_unicode {
        content = normalize_glyphs(&content);
    }
    let content = collapse_whitespace(&content);
    if content.is_empty() {
        return None;
    }

    Some(TextBlock {
        content,
        page,
        bbox,
        source_key: source_key.to_string(),
    })
}

/// Assemble every paragraph of a page, in order, skipping empty ones.
pub fn assemble_page(
    paragraphs: &[Paragraph],
    page: usize,
    source_key: &str,
    options: &ReflowOptions,
) -> Vec<TextBlock> {
    paragraphs
        .iter()
        .filter_map(|p| assemble_paragraph(p, page, source_key, options))
        .collect()
}
