//! Paragraph reconstruction from positioned PDF text.
//!
//! Turns the per-page text fragments a PDF renderer produces into clean,
//! paragraph-level [`TextBlock`]s carrying page and bounding-box provenance.
//! Running headers, footers and page numbers are removed by comparing pages
//! with each other, and the bibliography is cut off.
//!
//! ```no_run
//! # async fn demo(bytes: &[u8]) -> Result<(), reflow::ReflowError> {
//! let blocks = reflow::reflow_bytes(bytes, "paper-1", reflow::ReflowOptions::default()).await?;
//! for block in blocks {
//!     println!("[{}] {}", block.page, block.content);
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod config;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod types;

pub use config::{HeadingJoin, ReflowOptions};
pub use parser::backend::LopdfBackend;
pub use pipeline::{reconstruct_lines, CancelToken, ProgressFn, Reflow};
pub use source::{MemorySource, PageSource};
pub use types::*;

#[derive(Debug, Error)]
pub enum ReflowError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Cannot extract page {page}: {reason}")]
    Extraction { page: usize, reason: String },
    #[error("Malformed position for text fragment {text:?}")]
    MalformedPosition { text: String },
    #[error("Page provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse PDF bytes and reconstruct their paragraphs.
///
/// A document that cannot be parsed at all is reported as
/// [`ReflowError::ProviderUnavailable`] since no page can be supplied.
pub async fn reflow_bytes(
    bytes: &[u8],
    source_key: &str,
    options: ReflowOptions,
) -> Result<Vec<TextBlock>, ReflowError> {
    options.validate()?;
    let backend = LopdfBackend::load_bytes(bytes).map_err(|e| match e {
        ReflowError::Encrypted => e,
        other => ReflowError::ProviderUnavailable(other.to_string()),
    })?;
    Reflow::new(options).run(&backend, source_key).await
}
