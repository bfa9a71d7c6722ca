//! Content stream -> positioned text fragments.
//!
//! Walks a page's content-stream operators with a simplified PDF text-state
//! machine and produces one [`RawTextItem`] per text-showing operation.
//! Side effects (reading the PDF) live behind [`ContentBackend`].
//!
//! ```text
//! content ops  ->  RawTextItem[]  ->  PageContent
//!   (per page)      extract_page_items    + MediaBox, link annotations
//! ```

use super::backend::{
    decode_font_text, get_number_from_value, BackendFontInfo, ContentBackend, LinkArea, PageId,
    PdfValue,
};
use crate::types::{PageContent, PageSize, RawTextItem};
use crate::ReflowError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Approximate character width as a fraction of font size when no glyph
/// metrics are available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// The identity 2x3 text matrix: [a, b, c, d, tx, ty].
const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key).
    font_key: Vec<u8>,
    /// Current font size in text-space units.
    font_size: f32,
    /// Elements [a, b, c, d, tx, ty] of the current text matrix.
    text_matrix: [f32; 6],
    /// Text line matrix, set by BT and updated by Td/TD/T*/Tm.
    line_matrix: [f32; 6],
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn x(&self) -> f32 {
        self.text_matrix[4]
    }

    fn y(&self) -> f32 {
        self.text_matrix[5]
    }

    /// Rendered size: `font_size * sqrt(b^2 + d^2)`.
    fn effective_font_size(&self) -> f32 {
        let scale = (self.text_matrix[1].powi(2) + self.text_matrix[3].powi(2)).sqrt();
        (self.font_size * scale).abs()
    }

    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    /// Estimated width of `text` in page units.
    ///
    /// Scaled by the matrix `a` element, so a mirrored matrix yields a
    /// negative width.
    fn text_width(&self, text: &str) -> f32 {
        let n = text.chars().count() as f32;
        n * self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale * self.text_matrix[0]
    }

    /// Advance the text matrix after rendering `text`.
    fn advance_after_show(&mut self, text: &str) {
        let mut total_dx: f32 = 0.0;
        for ch in text.chars() {
            total_dx += self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
                + self.char_spacing;
            if ch == ' ' {
                total_dx += self.word_spacing;
            }
        }
        self.advance_x(total_dx);
    }
}

/// Per-page inputs shared by every operator handler, resolved once per page.
struct PageContext {
    fonts: Vec<BackendFontInfo>,
    links: Vec<LinkArea>,
}

impl PageContext {
    fn font(&self, key: &[u8]) -> Option<&BackendFontInfo> {
        self.fonts.iter().find(|f| f.name == key)
    }

    fn decode(&self, val: &PdfValue, font_key: &[u8]) -> String {
        match val {
            PdfValue::Str(bytes) => decode_font_text(self.font(font_key), bytes),
            _ => String::new(),
        }
    }

    fn link_at(&self, x: f32, y: f32) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.contains(x, y))
            .map(|l| l.uri.clone())
    }

    fn make_item(&self, text: String, x: f32, y: f32, state: &TextState) -> RawTextItem {
        let width = state.text_width(&text);
        let link = self.link_at(x, y);
        RawTextItem {
            text,
            x,
            y,
            width,
            height: state.effective_font_size(),
            link,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extract one page: its size and its text fragments in content-stream order.
///
/// A page without a usable MediaBox falls back to US Letter.
pub fn extract_page(
    backend: &dyn ContentBackend,
    page_id: PageId,
) -> Result<PageContent, ReflowError> {
    let size = backend.page_size(page_id).unwrap_or_else(|e| {
        log::debug!("page {:?}: {}; assuming letter size", page_id, e);
        PageSize::LETTER
    });
    let items = extract_page_items(backend, page_id)?;
    Ok(PageContent { size, items })
}

/// Walk a single page's content stream and produce its [`RawTextItem`]s.
///
/// | Operator | Action |
/// |----------|--------|
/// | `BT`     | Begin text object, reset matrices |
/// | `Tf`     | Set font and size |
/// | `Tm`     | Set text matrix directly |
/// | `Td`     | Translate text position |
/// | `TD`     | Translate and set leading |
/// | `T*`     | Move to start of next line |
/// | `TL` `Tc` `Tw` `Tz` `Ts` | Leading, spacing, scaling, rise |
/// | `Tj`     | Show a string |
/// | `TJ`     | Show strings with kerning adjustments |
/// | `'` `"`  | Move to next line and show string |
pub fn extract_page_items(
    backend: &dyn ContentBackend,
    page_id: PageId,
) -> Result<Vec<RawTextItem>, ReflowError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let ctx = PageContext {
        fonts: backend.page_fonts(page_id).unwrap_or_else(|e| {
            log::debug!("page {:?}: {}; decoding without font encodings", page_id, e);
            Vec::new()
        }),
        links: backend.page_links(page_id),
    };

    let mut state = TextState::default();
    let mut items: Vec<RawTextItem> = Vec::new();

    for op in &ops {
        match op.operator.as_str() {
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => handle_tf(&op.operands, &ctx, &mut state),
            "Tm" => handle_tm(&op.operands, &mut state),
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number_from_value(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number_from_value(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.translate_line(0.0, -state.leading),
            "TL" | "Tc" | "Tw" | "Tz" | "Ts" => {
                if let Some(v) = op.operands.first().and_then(get_number_from_value) {
                    match op.operator.as_str() {
                        "TL" => state.leading = v,
                        "Tc" => state.char_spacing = v,
                        "Tw" => state.word_spacing = v,
                        "Tz" => state.horiz_scale = v / 100.0,
                        _ => state.text_rise = v,
                    }
                }
            }
            "Tj" => {
                if let Some(first) = op.operands.first() {
                    emit_show_string(first, &ctx, &mut state, &mut items);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(arr)) = op.operands.first() {
                    handle_tj_array(arr, &ctx, &mut state, &mut items);
                }
            }
            "'" => {
                state.translate_line(0.0, -state.leading);
                if let Some(first) = op.operands.first() {
                    emit_show_string(first, &ctx, &mut state, &mut items);
                }
            }
            "\"" => {
                if op.operands.len() >= 3 {
                    if let Some(aw) = get_number_from_value(&op.operands[0]) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(&op.operands[1]) {
                        state.char_spacing = ac;
                    }
                    state.translate_line(0.0, -state.leading);
                    emit_show_string(&op.operands[2], &ctx, &mut state, &mut items);
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

// ---------------------------------------------------------------------------
// Operator handlers
// ---------------------------------------------------------------------------

fn handle_tf(operands: &[PdfValue], ctx: &PageContext, state: &mut TextState) {
    if operands.len() < 2 {
        return;
    }
    let key = match &operands[0] {
        PdfValue::Name(n) => n.clone(),
        PdfValue::Str(s) => s.clone(),
        _ => return,
    };
    if ctx.font(&key).is_none() {
        log::trace!("font {} not in page resources", String::from_utf8_lossy(&key));
    }
    state.font_key = key;
    state.font_size = get_number_from_value(&operands[1]).unwrap_or(0.0);
}

fn handle_tm(operands: &[PdfValue], state: &mut TextState) {
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    if vals.len() == 6 {
        state.text_matrix = [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]];
        state.line_matrix = state.text_matrix;
    }
}

/// Shared by `Tj`, `'` and `"`.
fn emit_show_string(
    operand: &PdfValue,
    ctx: &PageContext,
    state: &mut TextState,
    items: &mut Vec<RawTextItem>,
) {
    let text = ctx.decode(operand, &state.font_key);
    if text.is_empty() {
        return;
    }
    let x = state.x();
    let y = state.y() + state.text_rise;
    items.push(ctx.make_item(text.clone(), x, y, state));
    state.advance_after_show(&text);
}

/// `TJ` elements are strings or kerning adjustments in thousandths of a
/// text-space unit. The whole array becomes one item; large negative
/// adjustments become spaces.
fn handle_tj_array(
    arr: &[PdfValue],
    ctx: &PageContext,
    state: &mut TextState,
    items: &mut Vec<RawTextItem>,
) {
    let mut buf = String::new();
    let mut item_x = state.x();
    let item_y = state.y() + state.text_rise;

    for elem in arr {
        match elem {
            PdfValue::Str(_) => {
                let fragment = ctx.decode(elem, &state.font_key);
                if buf.is_empty() {
                    item_x = state.x();
                }
                buf.push_str(&fragment);
                state.advance_after_show(&fragment);
            }
            val => {
                if let Some(adj) = get_number_from_value(val) {
                    let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                    let gap_threshold =
                        state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale * 0.3;
                    if dx > gap_threshold && !buf.is_empty() {
                        buf.push(' ');
                    }
                    state.advance_x(dx);
                }
            }
        }
    }

    let trimmed = buf.trim_end();
    if !trimmed.is_empty() {
        items.push(ctx.make_item(trimmed.to_string(), item_x, item_y, state));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
