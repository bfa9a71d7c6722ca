//! Running header / footer / page-number removal.
//!
//! Two lines on different pages *repeat* each other when their comparison
//! keys are equal and their page-normalized boxes intersect.  Two scans mark
//! repeats on each page:
//!
//! - **edge scan**: walk both pages from the first line forward and from the
//!   last line backward in lockstep, marking while lines repeat and stopping
//!   a direction at its first mismatch;
//! - **interior scan**: every line outside the protected content region is
//!   compared with every line of the other page, counting matches.
//!
//! Cost is `O(pages^2 * lines^2)` in the worst case.  That is fine for a
//! paper or a report; for books, cap the page count with
//! [`ReflowOptions::max_pages`].
//!
//! Each page's scan only reads the shared [`PageLineSet`] and produces marks
//! for its own lines, so pages are scanned independently (in parallel when
//! [`ReflowOptions::parallel`] is set) and the marks written back afterwards.

use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;

use crate::config::ReflowOptions;
use crate::types::{BBox, DedupState, LineRef, PageLineSet, PageLines, PageSize};

/// Above this many pages a warning about quadratic cost is logged.
const LARGE_DOCUMENT_PAGES: usize = 300;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Comparison key for a line's text.
///
/// Short all-caps tokens (`"IV"`, `"ACM"`) collapse to nothing, then
/// whitespace and ASCII digits are stripped so that `"Page 3"` and
/// `"Page 4"` compare equal.
pub fn comparison_key(text: &str) -> String {
    static RE_CAPS: OnceLock<Regex> = OnceLock::new();
    let re = RE_CAPS.get_or_init(|| Regex::new(r"^[A-Z]{1,3}$").unwrap());

    let trimmed = text.trim();
    if re.is_match(trimmed) {
        return String::new();
    }
    trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_digit())
        .collect()
}

/// Inner region of a normalized page that interior repeats never touch.
pub fn protected_region(margin: f32) -> BBox {
    BBox {
        left: margin,
        right: 1.0 - margin,
        top: 1.0 - margin,
        bottom: margin,
    }
}

/// Compute and store a [`DedupState`] on every line of every page.
///
/// Existing marks are overwritten, so calling this twice is harmless.
pub fn mark_repeats(pages: &mut PageLineSet, options: &ReflowOptions) {
    if pages.len() > LARGE_DOCUMENT_PAGES {
        log::warn!(
            "cross-page dedup over {} pages is quadratic; consider setting max_pages",
            pages.len()
        );
    }

    let probes: Vec<PageProbe> = pages
        .iter()
        .map(|(&page, page_lines)| PageProbe::build(page, page_lines))
        .collect();
    let protected = protected_region(options.content_margin);

    let marks: Vec<Vec<Mark>> = if options.parallel {
        probes
            .par_iter()
            .map(|current| scan_page(current, &probes, &protected))
            .collect()
    } else {
        probes
            .iter()
            .map(|current| scan_page(current, &probes, &protected))
            .collect()
    };

    for (page_lines, page_marks) in pages.values_mut().zip(marks) {
        for (line, mark) in page_lines.lines.iter_mut().zip(page_marks) {
            line.dedup = mark.state;
            line.repeated_with = mark.with;
        }
    }
}

/// Drop every line whose mark calls for removal.  Returns how many went.
pub fn remove_repeats(pages: &mut PageLineSet, interior_threshold: u32) -> usize {
    let mut removed = 0;
    for (page, page_lines) in pages.iter_mut() {
        let before = page_lines.lines.len();
        page_lines
            .lines
            .retain(|line| !line.dedup.should_remove(interior_threshold));
        let dropped = before - page_lines.lines.len();
        if dropped > 0 {
            log::debug!("page {page}: removed {dropped} repeated line(s)");
        }
        removed += dropped;
    }
    removed
}

/// [`mark_repeats`] followed by [`remove_repeats`].
pub fn deduplicate(pages: &mut PageLineSet, options: &ReflowOptions) -> usize {
    mark_repeats(pages, options);
    remove_repeats(pages, options.interior_repeat_threshold)
}

// ---------------------------------------------------------------------------
// Internal: per-page scan
// ---------------------------------------------------------------------------

/// Precomputed comparison data for one line.
#[derive(Debug)]
struct Probe {
    key: String,
    blank: bool,
    bbox: BBox,
}

#[derive(Debug)]
struct PageProbe {
    page: usize,
    probes: Vec<Probe>,
}

impl PageProbe {
    fn build(page: usize, page_lines: &PageLines) -> Self {
        let size = if page_lines.size.is_usable() {
            page_lines.size
        } else {
            PageSize::LETTER
        };
        let probes = page_lines
            .lines
            .iter()
            .map(|line| Probe {
                key: comparison_key(&line.text),
                blank: line.text.trim().is_empty(),
                bbox: line.bbox().normalize(size),
            })
            .collect();
        PageProbe { page, probes }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mark {
    state: DedupState,
    with: Option<LineRef>,
}

impl Mark {
    fn edge(&mut self, state: DedupState, with: LineRef) {
        if !self.state.is_edge() {
            self.state = state;
        }
        self.with = Some(with);
    }

    fn interior(&mut self, with: LineRef) {
        self.state = match self.state {
            DedupState::Clean => DedupState::InteriorRepeat(1),
            DedupState::InteriorRepeat(n) => DedupState::InteriorRepeat(n + 1),
            edge => edge,
        };
        self.with = Some(with);
    }
}

/// Blank text never matches, even against blank text.
fn is_repeat(a: &Probe, b: &Probe) -> bool {
    !a.blank && !b.blank && a.key == b.key && a.bbox.intersects(&b.bbox)
}

fn scan_page(current: &PageProbe, all: &[PageProbe], protected: &BBox) -> Vec<Mark> {
    let mut marks = vec![Mark::default(); current.probes.len()];
    let len = current.probes.len();

    for other in all {
        if other.page == current.page {
            continue;
        }
        let other_len = other.probes.len();

        let mut forward = true;
        let mut backward = true;
        for offset in 0..len.min(other_len) {
            if !forward && !backward {
                break;
            }
            if forward {
                if is_repeat(&current.probes[offset], &other.probes[offset]) {
                    marks[offset].edge(
                        DedupState::EdgeRepeatForward,
                        LineRef {
                            page: other.page,
                            index: offset,
                        },
                    );
                } else {
                    forward = false;
                }
            }
            if backward {
                let ci = len - 1 - offset;
                let oi = other_len - 1 - offset;
                if is_repeat(&current.probes[ci], &other.probes[oi]) {
                    marks[ci].edge(
                        DedupState::EdgeRepeatBackward,
                        LineRef {
                            page: other.page,
                            index: oi,
                        },
                    );
                } else {
                    backward = false;
                }
            }
        }

        for (j, probe) in current.probes.iter().enumerate() {
            if probe.bbox.intersects(protected) {
                continue;
            }
            for (k, candidate) in other.probes.iter().enumerate() {
                if is_repeat(probe, candidate) {
                    marks[j].interior(LineRef {
                        page: other.page,
                        index: k,
                    });
                }
            }
        }
    }

    marks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
