//! Orchestration: page fetching, cancellation, progress, and the pure
//! reconstruction passes.
//!
//! ```text
//! PageSource ──page i──> merge_lines ──> truncate_references ──┐
//!      ^  (strictly in order, one page at a time)               │
//!      └────────────────────────────────────────────────────────┘
//!                                                   PageLineSet │
//!   deduplicate ──> segment_paragraphs ──> assemble_page ──> emit_blocks
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::ReflowOptions;
use crate::parser::dedup::deduplicate;
use crate::parser::lines::merge_lines;
use crate::parser::paragraph::segment_paragraphs;
use crate::parser::references::truncate_references;
use crate::render::assemble::assemble_page;
use crate::source::PageSource;
use crate::types::{PageLineSet, PageLines, PageSize, TextBlock};
use crate::ReflowError;

/// Progress observer, called with `(page_index, total_pages)` after each page.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the caller and a [`Reflow`].
///
/// Checked before each page is fetched; once set, no further pages are
/// requested and the pages already collected are still reconstructed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Reflow
// ---------------------------------------------------------------------------

/// One configured pipeline run. Holds no document state between runs.
#[derive(Clone, Default)]
pub struct Reflow {
    options: ReflowOptions,
    progress: Option<ProgressFn>,
    cancel: CancelToken,
}

impl Reflow {
    pub fn new(options: ReflowOptions) -> Self {
        Self {
            options,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ReflowOptions {
        &self.options
    }

    /// A handle that cancels this run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch pages in increasing index order and merge each into lines,
    /// cutting at reference headings.
    ///
    /// Only an unreachable provider is an error. Pages that fail to extract
    /// are logged and left out of the set.
    pub async fn collect_lines(&self, source: &dyn PageSource) -> Result<PageLineSet, ReflowError> {
        let page_count = source
            .page_count()
            .await
            .map_err(|e| ReflowError::ProviderUnavailable(e.to_string()))?;
        let total = self
            .options
            .max_pages
            .map_or(page_count, |max| max.min(page_count));

        let mut pages = PageLineSet::new();

        for index in 0..total {
            if self.cancel.is_cancelled() {
                log::info!("cancelled after {index} of {total} page(s)");
                break;
            }

            let content = match source.page(index).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("page {index}: {e}; skipping");
                    self.report(index, total);
                    continue;
                }
            };

            let size = if content.size.is_usable() {
                content.size
            } else {
                log::debug!("page {index}: unusable page size, assuming letter");
                PageSize::LETTER
            };

            let mut lines = merge_lines(content.items, self.options.round_positions);
            let truncation = truncate_references(
                &mut lines,
                index,
                page_count,
                self.options.reference_depth,
            );
            log::debug!("page {index}: {} line(s)", lines.len());

            pages.insert(index, PageLines { size, lines });
            self.report(index, total);

            if truncation.stops_document() {
                log::info!("page {index}: reference section reached, stopping");
                break;
            }
        }

        Ok(pages)
    }

    /// Full pipeline: [`Reflow::collect_lines`] then [`Reflow::reconstruct`].
    pub async fn run(
        &self,
        source: &dyn PageSource,
        source_key: &str,
    ) -> Result<Vec<TextBlock>, ReflowError> {
        let pages = self.collect_lines(source).await?;
        self.reconstruct(pages, source_key).await
    }

    /// [`reconstruct_lines`] on the blocking pool, keeping the quadratic
    /// dedup and the rayon fan-out off the async workers.
    pub async fn reconstruct(
        &self,
        pages: PageLineSet,
        source_key: &str,
    ) -> Result<Vec<TextBlock>, ReflowError> {
        let options = self.options.clone();
        let source_key = source_key.to_string();
        tokio::task::spawn_blocking(move || reconstruct_lines(pages, &options, &source_key))
            .await
            .map_err(|e| ReflowError::Task(format!("reconstruction task failed: {e}")))
    }

    fn report(&self, index: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(index, total);
        }
    }
}

// ---------------------------------------------------------------------------
// Pure reconstruction
// ---------------------------------------------------------------------------

/// Dedup, segment, and assemble a collected document.
///
/// Deterministic for a given input regardless of `options.parallel`.
pub fn reconstruct_lines(
    mut pages: PageLineSet,
    options: &ReflowOptions,
    source_key: &str,
) -> Vec<TextBlock> {
    let removed = deduplicate(&mut pages, options);
    log::debug!(
        "dedup removed {removed} line(s) across {} page(s)",
        pages.len()
    );

    let build = |(page, page_lines): (usize, PageLines)| {
        let paragraphs = segment_paragraphs(page_lines.lines, options.min_paragraph_lines);
        assemble_page(&paragraphs, page, source_key, options)
    };

    let ordered: Vec<(usize, PageLines)> = pages.into_iter().collect();
    let per_page: Vec<Vec<TextBlock>> = if options.parallel {
        ordered.into_par_iter().map(&build).collect()
    } else {
        ordered.into_iter().map(&build).collect()
    };

    emit_blocks(per_page)
}

/// Flatten per-page blocks in page order, dropping empty content.
pub fn emit_blocks(per_page: Vec<Vec<TextBlock>>) -> Vec<TextBlock> {
    per_page
        .into_iter()
        .flatten()
        .filter(|block| !block.content.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::source::MemorySource;
    use crate::types::{BBox, PageContent, RawTextItem};

    fn make_page(texts: &[&str]) -> PageContent {
        PageContent {
            size: PageSize::LETTER,
            items: texts
                .iter()
                .enumerate()
                .map(|(i, t)| RawTextItem::new(*t, 72.0, 700.0 - i as f32 * 14.0, 200.0, 10.0))
                .collect(),
        }
    }

    fn numbered_pages(n: usize) -> Vec<PageContent> {
        (0..n).map(|_| make_page(&["body text"])).collect()
    }

    /// Wraps a [`MemorySource`], recording fetches and injecting failures.
    struct ScriptedSource {
        inner: MemorySource,
        fail_count: bool,
        fail_pages: Vec<usize>,
        cancel_on: Option<(usize, CancelToken)>,
        fetched: Mutex<Vec<usize>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<PageContent>) -> Self {
            Self {
                inner: MemorySource::new(pages),
                fail_count: false,
                fail_pages: Vec::new(),
                cancel_on: None,
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<usize> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn page_count(&self) -> Result<usize, ReflowError> {
            if self.fail_count {
                return Err(ReflowError::Io(std::io::Error::other("renderer gone")));
            }
            self.inner.page_count().await
        }

        async fn page(&self, index: usize) -> Result<PageContent, ReflowError> {
            self.fetched.lock().unwrap().push(index);
            if let Some((at, token)) = &self.cancel_on {
                if *at == index {
                    token.cancel();
                }
            }
            if self.fail_pages.contains(&index) {
                return Err(ReflowError::Extraction {
                    page: index,
                    reason: "bad content stream".into(),
                });
            }
            self.inner.page(index).await
        }
    }

    #[tokio::test]
    async fn test_pages_fetched_in_order() {
        let source = ScriptedSource::new(numbered_pages(4));
        let pages = Reflow::default().collect_lines(&source).await.unwrap();
        assert_eq!(source.fetched(), vec![0, 1, 2, 3]);
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let mut source = ScriptedSource::new(numbered_pages(3));
        source.fail_pages = vec![1];
        let pages = Reflow::default().collect_lines(&source).await.unwrap();
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_unreachable_provider_aborts() {
        let mut source = ScriptedSource::new(numbered_pages(3));
        source.fail_count = true;
        let err = Reflow::default().run(&source, "k").await.unwrap_err();
        assert!(matches!(err, ReflowError::ProviderUnavailable(_)));
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_yields_nothing() {
        let source = MemorySource::default();
        let blocks = Reflow::default().run(&source, "k").await.unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_keeps_collected_pages() {
        let token = CancelToken::new();
        let mut source = ScriptedSource::new(numbered_pages(5));
        source.cancel_on = Some((1, token.clone()));

        let reflow = Reflow::default().with_cancel(token);
        let pages = reflow.collect_lines(&source).await.unwrap();

        assert_eq!(source.fetched(), vec![0, 1]);
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_partial_result() {
        let token = CancelToken::new();
        let mut source = ScriptedSource::new(vec![
            make_page(&["First page paragraph"]),
            make_page(&["Second page paragraph"]),
        ]);
        source.cancel_on = Some((0, token.clone()));

        let blocks = Reflow::default()
            .with_cancel(token)
            .run(&source, "k")
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "First page paragraph");
    }

    #[tokio::test]
    async fn test_progress_reported_per_page() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let mut source = ScriptedSource::new(numbered_pages(3));
        source.fail_pages = vec![2];

        Reflow::default()
            .with_progress(move |i, n| sink.lock().unwrap().push((i, n)))
            .collect_lines(&source)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn test_max_pages_caps_fetching() {
        let source = ScriptedSource::new(numbered_pages(10));
        let reflow = Reflow::new(ReflowOptions {
            max_pages: Some(2),
            ..ReflowOptions::default()
        });
        let pages = reflow.collect_lines(&source).await.unwrap();
        assert_eq!(source.fetched(), vec![0, 1]);
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_deep_reference_heading_stops_fetching() {
        let mut pages = numbered_pages(20);
        pages[18] = make_page(&["Conclusion text", "References", "[1] Someone"]);
        let source = ScriptedSource::new(pages);

        let lines = Reflow::default().collect_lines(&source).await.unwrap();
        assert_eq!(source.fetched().last(), Some(&18));
        assert_eq!(lines[&18].lines.len(), 1);
    }

    #[tokio::test]
    async fn test_early_reference_heading_only_cuts_page() {
        let mut pages = numbered_pages(20);
        pages[1] = make_page(&["Body", "see the references", "more"]);
        let source = ScriptedSource::new(pages);

        let lines = Reflow::default().collect_lines(&source).await.unwrap();
        assert_eq!(source.fetched().len(), 20);
        assert_eq!(lines[&1].lines.len(), 1);
    }

    #[tokio::test]
    async fn test_unusable_page_size_falls_back_to_letter() {
        let mut page = make_page(&["text"]);
        page.size = PageSize::new(0.0, f32::NAN);
        let source = MemorySource::new(vec![page]);
        let lines = Reflow::default().collect_lines(&source).await.unwrap();
        assert_eq!(lines[&0].size, PageSize::LETTER);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_reconstruct_off_runtime_matches_sync_core() {
        let source = MemorySource::new(vec![
            make_page(&["Running head", "first page body"]),
            make_page(&["Running head", "second page body"]),
        ]);
        let reflow = Reflow::default();
        let pages = reflow.collect_lines(&source).await.unwrap();

        let expected = reconstruct_lines(pages.clone(), reflow.options(), "doc");
        let blocks = reflow.reconstruct(pages, "doc").await.unwrap();
        assert_eq!(blocks, expected);
        assert!(blocks.iter().all(|b| !b.content.contains("Running head")));
    }

    #[test]
    fn test_emit_blocks_keeps_page_order_and_drops_empty() {
        let block = |content: &str, page| TextBlock {
            content: content.into(),
            page,
            bbox: BBox {
                left: 0.0,
                right: 1.0,
                top: 1.0,
                bottom: 0.0,
            },
            source_key: "k".into(),
        };
        let blocks = emit_blocks(vec![
            vec![block("a", 0), block("", 0)],
            vec![],
            vec![block("b", 2)],
        ]);
        let contents: Vec<&str> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
