//! Fragment -> line merging.
//!
//! Fragments arrive in reading order.  Consecutive fragments whose vertical
//! bands overlap are folded into one [`Line`]; the first fragment that does
//! not overlap closes the current line and starts the next one.  No column
//! detection happens here: two columns printed side by side interleave.

use crate::types::{Line, RawTextItem};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Merge one page's fragments into lines.
///
/// Blank fragments are dropped and fragments with unusable geometry are
/// skipped (logged at `warn`).  Widths are normalized before the band test,
/// and when `round_positions` is set `x`/`y` are rounded to one decimal place
/// first so that fragments a rounding error apart share a baseline.
pub fn merge_lines(items: Vec<RawTextItem>, round_positions: bool) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut current: Option<Line> = None;

    for item in items {
        if item.text.trim().is_empty() {
            continue;
        }
        let item = match prepare_item(item, round_positions) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("skipping text fragment: {e}");
                continue;
            }
        };

        let joins = current
            .as_ref()
            .is_some_and(|line| shares_band(line, &item));

        if joins {
            if let Some(line) = current.as_mut() {
                absorb(line, item);
            }
        } else if let Some(done) = current.replace(Line::from_item(item)) {
            lines.push(finalize(done));
        }
    }

    if let Some(done) = current {
        lines.push(finalize(done));
    }

    lines
}

/// Most frequent sample; ties go to the smallest value.
///
/// Returns `0.0` for an empty slice.
pub fn height_mode(samples: &[f32]) -> f32 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best = 0.0;
    let mut best_count = 0usize;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let run = sorted[i..].iter().take_while(|&&v| v == value).count();
        // Strict comparison keeps the earlier (smaller) value on ties.
        if run > best_count {
            best = value;
            best_count = run;
        }
        i += run;
    }
    best
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn prepare_item(
    mut item: RawTextItem,
    round_positions: bool,
) -> Result<RawTextItem, crate::ReflowError> {
    if round_positions {
        item.x = round_tenth(item.x);
        item.y = round_tenth(item.y);
    }
    item.normalized()
}

fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Bidirectional band test: same baseline, or either band starts inside the
/// other's `[y, y + height)` range.  Tolerates sub- and superscripts.
///
/// The line's height is still its first fragment's height at this point.
fn shares_band(line: &Line, item: &RawTextItem) -> bool {
    item.y == line.y
        || (item.y >= line.y && item.y < line.y + line.height)
        || (line.y >= item.y && line.y < item.y + item.height)
}

fn absorb(line: &mut Line, item: RawTextItem) {
    line.text.push(' ');
    line.text.push_str(&item.text);
    line.width += item.width;
    if line.link.is_none() {
        line.link = item.link;
    }
    line.height_samples.push(item.height);
}

fn finalize(mut line: Line) -> Line {
    line.height = height_mode(&line.height_samples);
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
