use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::{self, content::Content};

use super::extract::extract_page;
use crate::source::PageSource;
use crate::types::{BBox, PageContent, PageSize};
use crate::ReflowError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Encoding entry from the font dictionary, if present.
    pub encoding: Option<String>,
}

/// A `/Link` annotation with a URI action.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkArea {
    /// Annotation `/Rect` in page coordinates.
    pub rect: BBox,
    pub uri: String,
}

impl LinkArea {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.rect.left && x <= self.rect.right && y >= self.rect.bottom && y <= self.rect.top
    }
}

/// A simplified, lopdf-independent representation of a PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// Stream dictionaries are converted but the raw stream bytes are discarded
/// (they must be obtained through [`ContentBackend::page_content`]).
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(convert_entries(dict)),
        lopdf::Object::Stream(stream) => PdfValue::Dict(convert_entries(&stream.dict)),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

fn convert_entries(dict: &lopdf::Dictionary) -> Vec<(Vec<u8>, PdfValue)> {
    dict.iter()
        .map(|(k, v)| (k.clone(), convert_object(v)))
        .collect()
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix).
/// 2. Valid UTF-8.
/// 3. Latin-1, each byte mapped to its Unicode code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Decode a text-showing operand with the encoding declared by `font`.
///
/// Identity-H / Identity-V fonts use 2-byte CID codes; everything else goes
/// through [`decode_text_simple`].
pub fn decode_font_text(font: Option<&BackendFontInfo>, bytes: &[u8]) -> String {
    let identity = font
        .and_then(|f| f.encoding.as_deref())
        .is_some_and(|enc| enc.contains("Identity"));

    if identity && bytes.len() >= 2 && bytes.len().is_multiple_of(2) {
        let code_units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let decoded = String::from_utf16_lossy(&code_units);
        if !decoded.is_empty() && !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
            return decoded;
        }
    }

    decode_text_simple(bytes)
}

// ---------------------------------------------------------------------------
// ContentBackend trait
// ---------------------------------------------------------------------------

/// Synchronous, per-page view of a PDF used by the content-stream walker.
///
/// Exists so the text-state machine in [`super::extract`] can be driven by
/// a mock in tests.
pub trait ContentBackend {
    /// Page width and height from the (possibly inherited) MediaBox.
    fn page_size(&self, page: PageId) -> Result<PageSize, ReflowError>;

    /// URI link annotations on the page.
    fn page_links(&self, page: PageId) -> Vec<LinkArea>;

    /// Font information for every font referenced by the page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, ReflowError>;

    /// Raw (decompressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, ReflowError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, ReflowError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// [`ContentBackend`] and [`PageSource`] backed by a shared [`lopdf::Document`].
///
/// Cloning is cheap; clones share the parsed document.
#[derive(Clone)]
pub struct LopdfBackend {
    doc: Arc<lopdf::Document>,
    /// Page ids in page order; index 0 is the first page.
    page_ids: Vec<PageId>,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, ReflowError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| ReflowError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(ReflowError::Encrypted);
        }

        let page_ids = doc.get_pages().into_values().collect();
        Ok(Self {
            doc: Arc::new(doc),
            page_ids,
        })
    }

    /// Read and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReflowError> {
        let bytes = std::fs::read(path)?;
        Self::load_bytes(&bytes)
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// [`PageId`] of the zero-based page `index`.
    pub fn page_id(&self, index: usize) -> Option<PageId> {
        self.page_ids.get(index).copied()
    }

    /// Extract page dimensions from the MediaBox `[llx, lly, urx, ury]`.
    pub fn page_dimensions(&self, page: PageId) -> Result<PageSize, ReflowError> {
        let page_dict = self.page_dict(page)?;

        let media_box = self
            .find_media_box(page_dict)
            .ok_or_else(|| ReflowError::Parse("MediaBox not found for page".into()))?;

        let nums = self.array_to_f32s(&media_box)?;
        if nums.len() < 4 {
            return Err(ReflowError::Parse(format!(
                "MediaBox has {} elements, expected 4",
                nums.len()
            )));
        }

        Ok(PageSize::new(nums[2] - nums[0], nums[3] - nums[1]))
    }

    /// Collect `/Link` annotations whose action carries a `/URI`.
    pub fn link_areas(&self, page: PageId) -> Vec<LinkArea> {
        let Ok(page_dict) = self.page_dict(page) else {
            return Vec::new();
        };
        let Some(annots) = page_dict
            .get(b"Annots")
            .ok()
            .and_then(|obj| self.resolve_array(obj))
        else {
            return Vec::new();
        };

        annots.iter().filter_map(|a| self.link_area(a)).collect()
    }

    // -- private helpers ----------------------------------------------------

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, ReflowError> {
        self.doc
            .get_object(page)
            .map_err(|e| ReflowError::Parse(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| ReflowError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Follow a single level of indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    fn link_area(&self, obj: &lopdf::Object) -> Option<LinkArea> {
        let dict = self.resolve(obj).as_dict().ok()?;
        let subtype = dict.get(b"Subtype").ok()?.as_name().ok()?;
        if subtype != b"Link" {
            return None;
        }

        let action = self.resolve(dict.get(b"A").ok()?).as_dict().ok()?;
        let uri = match self.resolve(action.get(b"URI").ok()?) {
            lopdf::Object::String(bytes, _) => decode_text_simple(bytes),
            _ => return None,
        };

        let rect = self.resolve_array(dict.get(b"Rect").ok()?)?;
        let nums = self.array_to_f32s(&rect).ok()?;
        if nums.len() < 4 {
            return None;
        }

        Some(LinkArea {
            rect: BBox {
                left: nums[0].min(nums[2]),
                right: nums[0].max(nums[2]),
                top: nums[1].max(nums[3]),
                bottom: nums[1].min(nums[3]),
            },
            uri,
        })
    }

    /// Walk up the page tree to find the MediaBox array.
    fn find_media_box(&self, dict: &lopdf::Dictionary) -> Option<Vec<lopdf::Object>> {
        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Some(arr) = self.resolve_array(obj) {
                return Some(arr);
            }
        }

        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.find_media_box(parent)
    }

    /// Resolve an object to an array, following a single level of indirection.
    fn resolve_array(&self, obj: &lopdf::Object) -> Option<Vec<lopdf::Object>> {
        self.resolve(obj).as_array().ok().cloned()
    }

    /// Convert a vector of lopdf objects to `f32` values.
    fn array_to_f32s(&self, objects: &[lopdf::Object]) -> Result<Vec<f32>, ReflowError> {
        objects
            .iter()
            .map(|obj| match self.resolve(obj) {
                lopdf::Object::Integer(i) => Ok(*i as f32),
                lopdf::Object::Real(f) => Ok(*f),
                other => Err(ReflowError::Parse(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ContentBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl ContentBackend for LopdfBackend {
    fn page_size(&self, page: PageId) -> Result<PageSize, ReflowError> {
        self.page_dimensions(page)
    }

    fn page_links(&self, page: PageId) -> Vec<LinkArea> {
        self.link_areas(page)
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, ReflowError> {
        let fonts_map = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| ReflowError::Parse(format!("cannot get page fonts: {}", e)))?;

        Ok(fonts_map
            .iter()
            .map(|(name, dict)| BackendFontInfo {
                name: name.clone(),
                encoding: dict.get(b"Encoding").ok().and_then(|o| match o {
                    lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                    _ => None,
                }),
            })
            .collect())
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, ReflowError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| ReflowError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, ReflowError> {
        let content = Content::decode(data)
            .map_err(|e| ReflowError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// PageSource implementation for LopdfBackend
// ---------------------------------------------------------------------------

#[async_trait]
impl PageSource for LopdfBackend {
    async fn page_count(&self) -> Result<usize, ReflowError> {
        Ok(self.page_ids.len())
    }

    /// Walks the page's content stream on the blocking pool.
    async fn page(&self, index: usize) -> Result<PageContent, ReflowError> {
        let page_id = self.page_id(index).ok_or_else(|| ReflowError::Extraction {
            page: index,
            reason: "page index out of range".into(),
        })?;

        let backend = self.clone();
        let result = tokio::task::spawn_blocking(move || extract_page(&backend, page_id))
            .await
            .map_err(|e| ReflowError::Extraction {
                page: index,
                reason: format!("extraction task failed: {}", e),
            })?;

        result.map_err(|e| match e {
            ReflowError::Extraction { .. } => e,
            other => ReflowError::Extraction {
                page: index,
                reason: other.to_string(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
