//! Provider seam between the pipeline and whatever renders the document.

use async_trait::async_trait;

use crate::types::PageContent;
use crate::ReflowError;

/// Supplies positioned text one page at a time.
///
/// `page_count` failing means the provider cannot be reached at all and
/// aborts the pipeline. A failing `page` only loses that page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn page_count(&self) -> Result<usize, ReflowError>;

    /// Content of the zero-based page `index`.
    async fn page(&self, index: usize) -> Result<PageContent, ReflowError>;
}

/// Pre-extracted pages held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<PageContent>,
}

impl MemorySource {
    pub fn new(pages: Vec<PageContent>) -> Self {
        Self { pages }
    }

    /// Parse a JSON array of [`PageContent`].
    pub fn from_json(json: &str) -> Result<Self, ReflowError> {
        let pages = serde_json::from_str(json).map_err(|e| ReflowError::Parse(e.to_string()))?;
        Ok(Self { pages })
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn page_count(&self) -> Result<usize, ReflowError> {
        Ok(self.pages.len())
    }

    async fn page(&self, index: usize) -> Result<PageContent, ReflowError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| ReflowError::Extraction {
                page: index,
                reason: "page index out of range".into(),
            })
    }
}
