//! End-to-end ingest pipeline: seed URL and/or uploaded text → documents → chunks.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use webai_crawler::{CrawlResult, CrawlState, Crawler};
use webai_shared::{AppConfig, CrawlConfig, Result, WebAiError};

use crate::document::Document;
use crate::splitter::{Chunk, TextSplitter};

/// Text supplied alongside (or instead of) a website.
#[derive(Debug, Clone)]
pub struct UploadedText {
    /// Display name, usually the uploaded file name.
    pub name: String,
    pub text: String,
}

/// Everything the pipeline needs for one ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Seed URL to crawl. Empty strings count as absent.
    pub url: Option<String>,
    pub uploaded: Option<UploadedText>,
    /// Hops to follow from the seed.
    pub max_depth: u32,
    pub crawl: CrawlConfig,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IngestRequest {
    /// Build a request with crawl and splitter settings from `config`.
    pub fn from_config(
        config: &AppConfig,
        url: Option<String>,
        uploaded: Option<UploadedText>,
        max_depth: u32,
    ) -> Self {
        Self {
            url,
            uploaded,
            max_depth,
            crawl: CrawlConfig::from(config),
            chunk_size: config.ingest.chunk_size,
            chunk_overlap: config.ingest.chunk_overlap,
        }
    }
}

/// Crawl statistics kept after the pages are turned into documents.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub seed: String,
    pub max_depth: u32,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub links_rejected: usize,
    pub extraction_skipped: usize,
    pub redirect_duplicates: usize,
    pub hit_page_limit: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl From<&CrawlResult> for CrawlSummary {
    fn from(result: &CrawlResult) -> Self {
        Self {
            seed: result.seed.to_string(),
            max_depth: result.max_depth,
            pages_fetched: result.pages.len(),
            pages_failed: result.failures.len(),
            links_rejected: result.links_rejected,
            extraction_skipped: result.extraction_skipped,
            redirect_duplicates: result.redirect_duplicates,
            hit_page_limit: result.hit_page_limit,
            cancelled: result.state == CrawlState::Cancelled,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Output of the pipeline, owned by the caller afterwards.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
    /// Present when a crawl reached its seed.
    pub crawl: Option<CrawlSummary>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the crawl has returned.
    fn crawl_finished(&self, summary: &CrawlSummary);
    /// Called when the pipeline completes.
    fn done(&self, result: &IngestResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn crawl_finished(&self, _summary: &CrawlSummary) {}
    fn done(&self, _result: &IngestResult) {}
}

/// Run the ingest pipeline.
///
/// 1. Crawl the seed (if any)
/// 2. Append uploaded text (if any)
/// 3. Split every document into chunks
///
/// An unreachable seed is tolerated when uploaded text is present; the
/// pipeline then continues with the upload alone.
#[instrument(skip_all, fields(url = ?request.url, max_depth = request.max_depth))]
pub async fn ingest(
    request: &IngestRequest,
    progress: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> Result<IngestResult> {
    let start = Instant::now();

    let seed = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let uploaded = request
        .uploaded
        .as_ref()
        .filter(|u| !u.text.trim().is_empty());

    let mut documents = Vec::new();
    let mut crawl = None;

    // --- Phase 1: Crawl ---
    if let Some(seed) = seed {
        progress.phase("Crawling website");
        let crawler = Crawler::new(request.crawl.clone())?;

        match crawler
            .crawl_with_cancellation(seed, request.max_depth, cancel)
            .await
        {
            Ok(result) => {
                let summary = CrawlSummary::from(&result);
                progress.crawl_finished(&summary);
                documents.extend(
                    result
                        .documents()
                        .into_iter()
                        .filter(|(_, text)| !text.trim().is_empty())
                        .map(|(url, text)| Document::web(url, text)),
                );
                crawl = Some(summary);
            }
            Err(e) if e.is_seed_unreachable() && uploaded.is_some() => {
                warn!(error = %e, "seed unreachable, continuing with uploaded text only");
            }
            Err(e) => return Err(e),
        }
    }

    // --- Phase 2: Uploaded text ---
    if let Some(upload) = uploaded {
        documents.push(Document::uploaded(upload.name.clone(), upload.text.clone()));
    }

    if documents.is_empty() {
        return Err(WebAiError::validation("no content to ingest"));
    }

    // --- Phase 3: Split ---
    progress.phase("Splitting documents");
    let splitter = TextSplitter::new(request.chunk_size, request.chunk_overlap);
    let chunks = splitter.split_documents(&documents);

    let result = IngestResult {
        documents,
        chunks,
        crawl,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        documents = result.documents.len(),
        chunks = result.chunks.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "ingest complete"
    );

    Ok(result)
}
