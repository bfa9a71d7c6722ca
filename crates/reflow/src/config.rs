use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ReflowError;

/// How a paragraph's text continues after a line that is taller than the
/// line following it (typically a heading run into its body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingJoin {
    /// Append a newline to the accumulated text.
    #[default]
    Newline,
    /// Replace everything accumulated so far with a newline. Kept for output
    /// parity with older extractions; discards the text before the break.
    Replace,
}

/// Tunable thresholds for the reconstruction pipeline.
///
/// Every field has a default, so a TOML file only needs to name the values it
/// changes:
///
/// ```toml
/// min_paragraph_lines = 4
/// max_pages = 200
/// heading_join = "replace"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflowOptions {
    /// A paragraph must hold at least this many lines before any break cue
    /// is honoured.
    pub min_paragraph_lines: usize,
    /// Relative page depth (page index / page count) from which a
    /// bibliography heading ends the document.
    pub reference_depth: f32,
    /// Fraction of the page on every side outside the protected content
    /// region.
    pub content_margin: f32,
    /// Interior repeats above this count are removed.
    pub interior_repeat_threshold: u32,
    pub heading_join: HeadingJoin,
    /// Stop fetching after this many pages. Cross-page dedup is quadratic in
    /// pages and lines, so very large documents should set this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    /// Run dedup, segmentation and assembly on the rayon pool.
    pub parallel: bool,
    /// Round fragment positions to one decimal place before merging.
    pub round_positions: bool,
    /// NFC-normalize emitted content and expand typographic ligatures.
    pub normalize_unicode: bool,
}

impl Default for ReflowOptions {
    fn default() -> Self {
        Self {
            min_paragraph_lines: 5,
            reference_depth: 0.9,
            content_margin: 0.2,
            interior_repeat_threshold: 3,
            heading_join: HeadingJoin::Newline,
            max_pages: None,
            parallel: true,
            round_positions: true,
            normalize_unicode: true,
        }
    }
}

impl ReflowOptions {
    /// Parse options from a TOML document and validate them.
    pub fn from_toml_str(s: &str) -> Result<Self, ReflowError> {
        let options: ReflowOptions =
            toml::from_str(s).map_err(|e| ReflowError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Read and parse a TOML options file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReflowError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ReflowError> {
        toml::to_string_pretty(self).map_err(|e| ReflowError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReflowError> {
        if self.min_paragraph_lines == 0 {
            return Err(ReflowError::Config(
                "min_paragraph_lines must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reference_depth) {
            return Err(ReflowError::Config(format!(
                "reference_depth must be within [0, 1], got {}",
                self.reference_depth
            )));
        }
        if !(0.0..0.5).contains(&self.content_margin) {
            return Err(ReflowError::Config(format!(
                "content_margin must be within [0, 0.5), got {}",
                self.content_margin
            )));
        }
        if self.max_pages == Some(0) {
            return Err(ReflowError::Config("max_pages must be at least 1".into()));
        }
        Ok(())
    }
}
