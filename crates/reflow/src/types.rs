use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ReflowError;

/// A single positioned text fragment as delivered by a [`PageSource`].
///
/// Coordinates follow PDF user space: `y` is the baseline measured upwards
/// from the bottom of the page and `height` is the rendered font size.
///
/// [`PageSource`]: crate::PageSource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Negative for right-to-left or mirrored glyph runs.
    pub width: f32,
    pub height: f32,
    /// Carried annotation, e.g. the target of a hyperlink covering the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RawTextItem {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        RawTextItem {
            text: text.into(),
            x,
            y,
            width,
            height,
            link: None,
        }
    }

    /// Validate the fragment's geometry and fold a negative width into the
    /// origin so that `width` is always non-negative afterwards.
    pub fn normalized(mut self) -> Result<Self, ReflowError> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.height <= 0.0 {
            return Err(ReflowError::MalformedPosition { text: self.text });
        }
        if self.width < 0.0 {
            self.x += self.width;
            self.width = -self.width;
        }
        Ok(self)
    }
}

/// Page dimensions in the provider's native units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        PageSize { width, height }
    }

    /// US Letter in PDF points, used when a page carries no usable MediaBox.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Everything a provider returns for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub size: PageSize,
    pub items: Vec<RawTextItem>,
}

/// Axis-aligned rectangle. `top` is the larger `y` value (PDF orientation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl BBox {
    /// Rectangles intersect unless they are disjoint on either axis.
    /// Touching edges count as intersecting.
    pub fn intersects(&self, other: &BBox) -> bool {
        !(other.right < self.left
            || other.left > self.right
            || other.bottom > self.top
            || other.top < self.bottom)
    }

    /// Scale into `[0, 1]` fractions of the given page size.
    pub fn normalize(&self, size: PageSize) -> BBox {
        BBox {
            left: self.left / size.width,
            right: self.right / size.width,
            top: self.top / size.height,
            bottom: self.bottom / size.height,
        }
    }

    /// Grow to cover `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            left: self.left.min(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

/// Position of a line inside a [`PageLineSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRef {
    pub page: usize,
    pub index: usize,
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}:l{}", self.page, self.index)
    }
}

/// Outcome of the cross-page repeat scan for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "count", rename_all = "snake_case")]
pub enum DedupState {
    #[default]
    Clean,
    EdgeRepeatForward,
    EdgeRepeatBackward,
    InteriorRepeat(u32),
}

impl DedupState {
    /// Edge repeats are always dropped; interior repeats only once they have
    /// matched more than `interior_threshold` lines elsewhere.
    pub fn should_remove(&self, interior_threshold: u32) -> bool {
        match self {
            DedupState::Clean => false,
            DedupState::EdgeRepeatForward | DedupState::EdgeRepeatBackward => true,
            DedupState::InteriorRepeat(count) => *count > interior_threshold,
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            DedupState::EdgeRepeatForward | DedupState::EdgeRepeatBackward
        )
    }
}

/// One or more fragments merged because they occupy the same vertical band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub width: f32,
    /// Mode of `height_samples` once the line is finalized.
    pub height: f32,
    pub height_samples: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub dedup: DedupState,
    /// Last line on another page this one was found to repeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeated_with: Option<LineRef>,
}

impl Line {
    /// Start a line from a single (already normalized) fragment.
    pub fn from_item(item: RawTextItem) -> Self {
        Line {
            x: item.x,
            y: item.y,
            text: item.text,
            width: item.width,
            height: item.height,
            height_samples: vec![item.height],
            link: item.link,
            dedup: DedupState::Clean,
            repeated_with: None,
        }
    }

    /// Native-coordinate bounding box of the line.
    pub fn bbox(&self) -> BBox {
        BBox {
            left: self.x,
            right: self.x + self.width,
            top: self.y + self.height,
            bottom: self.y,
        }
    }
}

/// Lines of one page together with the size needed to normalize them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLines {
    pub size: PageSize,
    pub lines: Vec<Line>,
}

/// Page index to that page's lines, for the whole (processed) document.
pub type PageLineSet = BTreeMap<usize, PageLines>;

/// Lines grouped into one semantic block.
pub type Paragraph = Vec<Line>;

/// Final output unit: paragraph text plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub content: String,
    pub page: usize,
    #[serde(rename = "box")]
    pub bbox: BBox,
    #[serde(rename = "sourceKey")]
    pub source_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_width_is_folded_into_origin() {
        let item = RawTextItem::new("abc", 100.0, 50.0, -20.0, 10.0)
            .normalized()
            .unwrap();
        assert_eq!(item.x, 80.0);
        assert_eq!(item.width, 20.0);
    }

    #[test]
    fn test_positive_width_untouched() {
        let item = RawTextItem::new("abc", 100.0, 50.0, 20.0, 10.0)
            .normalized()
            .unwrap();
        assert_eq!(item.x, 100.0);
        assert_eq!(item.width, 20.0);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let err = RawTextItem::new("abc", f32::NAN, 50.0, 20.0, 10.0)
            .normalized()
            .unwrap_err();
        assert!(matches!(err, ReflowError::MalformedPosition { ref text } if text == "abc"));

        let err = RawTextItem::new("abc", 1.0, f32::INFINITY, 20.0, 10.0).normalized();
        assert!(err.is_err());
    }

    #[test]
    fn test_zero_height_rejected() {
        assert!(RawTextItem::new("abc", 1.0, 1.0, 20.0, 0.0)
            .normalized()
            .is_err());
    }

    #[test]
    fn test_bbox_intersects_overlapping_and_touching() {
        let a = BBox {
            left: 0.0,
            right: 0.5,
            top: 0.5,
            bottom: 0.0,
        };
        let b = BBox {
            left: 0.4,
            right: 0.9,
            top: 0.9,
            bottom: 0.4,
        };
        let touching = BBox {
            left: 0.5,
            right: 0.6,
            top: 0.6,
            bottom: 0.5,
        };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_bbox_disjoint_on_one_axis() {
        let a = BBox {
            left: 0.0,
            right: 0.5,
            top: 0.5,
            bottom: 0.0,
        };
        let right_of = BBox {
            left: 0.6,
            right: 0.9,
            top: 0.5,
            bottom: 0.0,
        };
        let above = BBox {
            left: 0.0,
            right: 0.5,
            top: 0.9,
            bottom: 0.6,
        };
        assert!(!a.intersects(&right_of));
        assert!(!a.intersects(&above));
    }

    #[test]
    fn test_bbox_normalize() {
        let b = BBox {
            left: 61.2,
            right: 306.0,
            top: 792.0,
            bottom: 396.0,
        };
        let n = b.normalize(PageSize::LETTER);
        assert!((n.left - 0.1).abs() < 1e-6);
        assert!((n.right - 0.5).abs() < 1e-6);
        assert!((n.top - 1.0).abs() < 1e-6);
        assert!((n.bottom - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dedup_state_removal_predicate() {
        assert!(!DedupState::Clean.should_remove(3));
        assert!(DedupState::EdgeRepeatForward.should_remove(3));
        assert!(DedupState::EdgeRepeatBackward.should_remove(3));
        assert!(!DedupState::InteriorRepeat(3).should_remove(3));
        assert!(DedupState::InteriorRepeat(4).should_remove(3));
    }

    #[test]
    fn test_text_block_serializes_with_external_field_names() {
        let block = TextBlock {
            content: "Hello".to_string(),
            page: 2,
            bbox: BBox {
                left: 1.0,
                right: 2.0,
                top: 4.0,
                bottom: 3.0,
            },
            source_key: "abc".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["sourceKey"], "abc");
        assert_eq!(json["box"]["left"], 1.0);
        assert_eq!(json["page"], 2);
    }

    #[test]
    fn test_line_ref_display() {
        assert_eq!(LineRef { page: 3, index: 7 }.to_string(), "p3:l7");
    }
}
