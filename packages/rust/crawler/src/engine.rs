//! Bounded, breadth-first site crawler.
//!
//! The crawler starts from a seed URL, follows same-host links level by
//! level up to a maximum depth, and returns the distinct pages it fetched
//! in discovery order. Only a failure to fetch the seed fails the crawl.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use webai_shared::{CrawlConfig, Result, WebAiError};

use crate::links::{extract_links, is_http, normalize_url};
use crate::text::{extract_text, extract_title};
use crate::visited::VisitedSet;

// ---------------------------------------------------------------------------
// Page outcomes
// ---------------------------------------------------------------------------

/// Why a single page could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageFailure {
    /// The request timed out twice.
    #[error("timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection, DNS, TLS or redirect-limit failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be read.
    #[error("body read failed: {0}")]
    Body(String),

    /// A redirect led off the seed's host.
    #[error("redirected off-site to {0}")]
    OffSiteRedirect(String),

    /// The crawl was cancelled before the fetch completed.
    #[error("cancelled")]
    Cancelled,
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Normalized URL the page was requested as (its identity in the crawl).
    pub url: Url,
    /// URL the response came from after redirects.
    pub final_url: Url,
    /// Hops from the seed.
    pub depth: u32,
    /// HTTP status code.
    pub status_code: u16,
    /// `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
    /// Whether the body was parsed as HTML.
    pub markup: bool,
    /// Raw response body.
    pub body: String,
    /// Readable text extracted from the body.
    pub text: String,
    /// Page title, if any.
    pub title: Option<String>,
    /// Links discovered on the page. Empty for terminal-depth pages.
    pub links: Vec<Url>,
    /// SHA-256 of the raw body.
    pub content_hash: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// Result of fetching one frontier entry.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Fetched(Box<FetchedPage>),
    Failed(PageFailure),
}

/// A page that was enqueued but could not be fetched.
#[derive(Debug, Clone)]
pub struct FailedPage {
    pub url: Url,
    pub depth: u32,
    pub reason: PageFailure,
}

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// How a crawl that produced a result ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// The frontier drained or the page ceiling was reached.
    Completed,
    /// The cancellation token fired; `pages` holds what finished before it.
    Cancelled,
}

/// Outcome of a crawl that reached its seed.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Normalized seed URL.
    pub seed: Url,
    /// Depth bound the crawl ran with.
    pub max_depth: u32,
    /// Distinct fetched pages in discovery order.
    pub pages: Vec<FetchedPage>,
    /// Non-seed pages that failed.
    pub failures: Vec<FailedPage>,
    /// Discovered links dropped for being off-host.
    pub links_rejected: usize,
    /// Fetched pages whose body was not markup (no links extracted).
    pub extraction_skipped: usize,
    /// Pages dropped because they redirected to an already-crawled URL.
    pub redirect_duplicates: usize,
    /// Whether the global page ceiling stopped the crawl.
    pub hit_page_limit: bool,
    pub state: CrawlState,
    pub duration: Duration,
}

impl CrawlResult {
    fn new(seed: Url, max_depth: u32) -> Self {
        Self {
            seed,
            max_depth,
            pages: Vec::new(),
            failures: Vec::new(),
            links_rejected: 0,
            extraction_skipped: 0,
            redirect_duplicates: 0,
            hit_page_limit: false,
            state: CrawlState::Completed,
            duration: Duration::ZERO,
        }
    }

    /// `(url, text)` pairs for the ingestion pipeline.
    pub fn documents(&self) -> Vec<(Url, String)> {
        self.pages
            .iter()
            .map(|p| (p.url.clone(), p.text.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Depth-bounded crawler restricted to the seed's host.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| WebAiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Crawl from `seed`, following links up to `max_depth` hops.
    pub async fn crawl(&self, seed: &str, max_depth: u32) -> Result<CrawlResult> {
        self.crawl_with_cancellation(seed, max_depth, CancellationToken::new())
            .await
    }

    /// Crawl from `seed`, stopping early once `cancel` fires.
    ///
    /// The seed is depth 0. Pages at `max_depth` are fetched but their links
    /// are not followed, so `max_depth = 1` yields the seed plus the pages it
    /// links to. Fails only with [`WebAiError::SeedUnreachable`].
    #[instrument(skip_all, fields(seed = %seed, max_depth = max_depth))]
    pub async fn crawl_with_cancellation(
        &self,
        seed: &str,
        max_depth: u32,
        cancel: CancellationToken,
    ) -> Result<CrawlResult> {
        let start_time = Instant::now();

        let seed_url = parse_seed(seed)?;
        let scope = CrawlScope::new(&seed_url);
        let visited = VisitedSet::new();
        let concurrency = self.config.concurrency.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();
        visited.insert(&seed_url).await;
        frontier.push_back((seed_url.clone(), 0));

        let mut result = CrawlResult::new(seed_url.clone(), max_depth);

        info!(
            concurrency,
            timeout_ms = self.config.timeout_ms,
            max_pages = self.config.max_pages,
            "starting crawl"
        );

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                result.state = CrawlState::Cancelled;
                break;
            }

            let remaining = self.config.max_pages.saturating_sub(result.pages.len());
            if remaining == 0 {
                info!(max_pages = self.config.max_pages, "page ceiling reached");
                result.hit_page_limit = true;
                break;
            }

            // Take a batch from the front of the frontier
            let take = frontier.len().min(concurrency).min(remaining);
            let batch: Vec<(Url, u32)> = frontier.drain(..take).collect();

            let mut handles = Vec::with_capacity(batch.len());

            for (url, depth) in batch {
                let client = self.client.clone();
                let sem = semaphore.clone();
                let cancel = cancel.clone();
                let rate_limit = self.config.rate_limit_ms;
                let follow_links = depth < max_depth;
                let target = url.clone();

                let handle = tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return PageOutcome::Failed(PageFailure::Cancelled);
                    };

                    if cancel.is_cancelled() {
                        return PageOutcome::Failed(PageFailure::Cancelled);
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => PageOutcome::Failed(PageFailure::Cancelled),
                        outcome = async {
                            if rate_limit > 0 {
                                tokio::time::sleep(Duration::from_millis(rate_limit)).await;
                            }
                            fetch_page(&client, &target, depth, follow_links).await
                        } => outcome,
                    }
                });

                handles.push((url, depth, handle));
            }

            // Collect in enqueue order, not completion order
            for (url, depth, handle) in handles {
                let outcome = handle.await.unwrap_or_else(|e| {
                    PageOutcome::Failed(PageFailure::Transport(format!("fetch task failed: {e}")))
                });

                let outcome = match outcome {
                    PageOutcome::Fetched(page) if !scope.in_scope(&page.final_url) => {
                        PageOutcome::Failed(PageFailure::OffSiteRedirect(page.final_url.to_string()))
                    }
                    other => other,
                };

                match outcome {
                    PageOutcome::Fetched(page) => {
                        let target = normalize_url(&page.final_url);
                        if target != page.url && !visited.insert(&target).await {
                            debug!(url = %page.url, final_url = %target, "redirect target already crawled");
                            result.redirect_duplicates += 1;
                            continue;
                        }

                        if !page.markup {
                            result.extraction_skipped += 1;
                        }

                        for link in &page.links {
                            if !scope.in_scope(link) {
                                result.links_rejected += 1;
                                continue;
                            }
                            if visited.insert(link).await {
                                frontier.push_back((link.clone(), depth + 1));
                            }
                        }

                        result.pages.push(*page);
                    }
                    PageOutcome::Failed(PageFailure::Cancelled) => {
                        result.state = CrawlState::Cancelled;
                    }
                    PageOutcome::Failed(reason) if depth == 0 => {
                        warn!(%url, error = %reason, "seed fetch failed");
                        return Err(WebAiError::seed_unreachable(url.to_string(), reason.to_string()));
                    }
                    PageOutcome::Failed(reason) => {
                        warn!(%url, depth, error = %reason, "page fetch failed");
                        result.failures.push(FailedPage { url, depth, reason });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            result.state = CrawlState::Cancelled;
        }
        result.duration = start_time.elapsed();

        info!(
            pages_fetched = result.pages.len(),
            failures = result.failures.len(),
            links_rejected = result.links_rejected,
            extraction_skipped = result.extraction_skipped,
            redirect_duplicates = result.redirect_duplicates,
            hit_page_limit = result.hit_page_limit,
            state = ?result.state,
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok(result)
    }
}

/// Parse and normalize the seed, failing the crawl cleanly on bad input.
fn parse_seed(seed: &str) -> Result<Url> {
    let url = Url::parse(seed.trim())
        .map_err(|e| WebAiError::seed_unreachable(seed, format!("invalid URL: {e}")))?;

    if !is_http(&url) {
        return Err(WebAiError::seed_unreachable(
            seed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(WebAiError::seed_unreachable(seed, "URL has no host"));
    }

    Ok(normalize_url(&url))
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Restricts a crawl to the seed's exact host.
struct CrawlScope {
    host: String,
}

impl CrawlScope {
    fn new(seed: &Url) -> Self {
        Self {
            host: seed.host_str().unwrap_or_default().to_string(),
        }
    }

    fn in_scope(&self, url: &Url) -> bool {
        is_http(url) && url.host_str() == Some(self.host.as_str())
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Response fields kept from a successful request.
struct RawResponse {
    status_code: u16,
    final_url: Url,
    content_type: Option<String>,
    body: String,
}

/// Fetch a single page, retrying once on timeout, and analyse its body.
async fn fetch_page(client: &Client, url: &Url, depth: u32, follow_links: bool) -> PageOutcome {
    debug!(%url, depth, "fetching page");

    let raw = match request(client, url).await {
        Err(PageFailure::Timeout) => {
            debug!(%url, "timed out, retrying once");
            request(client, url).await
        }
        other => other,
    };

    match raw {
        Ok(raw) => PageOutcome::Fetched(Box::new(build_page(url, depth, follow_links, raw))),
        Err(reason) => PageOutcome::Failed(reason),
    }
}

/// One GET request, including the body read.
async fn request(client: &Client, url: &Url) -> std::result::Result<RawResponse, PageFailure> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(PageFailure::Status(status.as_u16()));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            PageFailure::Timeout
        } else {
            PageFailure::Body(e.to_string())
        }
    })?;

    Ok(RawResponse {
        status_code: status.as_u16(),
        final_url,
        content_type,
        body,
    })
}

fn classify(err: reqwest::Error) -> PageFailure {
    if err.is_timeout() {
        PageFailure::Timeout
    } else {
        PageFailure::Transport(err.to_string())
    }
}

/// Turn a raw response into a page record. Synchronous so the parsed
/// document never lives across an await point.
fn build_page(url: &Url, depth: u32, follow_links: bool, raw: RawResponse) -> FetchedPage {
    let markup = is_markup(raw.content_type.as_deref());

    let (title, text, links) = if markup {
        let doc = Html::parse_document(&raw.body);
        let links = if follow_links {
            extract_links(&doc, &raw.final_url)
        } else {
            Vec::new()
        };
        (extract_title(&doc), extract_text(&doc), links)
    } else if is_text(raw.content_type.as_deref()) {
        debug!(%url, content_type = ?raw.content_type, "not markup, skipping link extraction");
        (None, raw.body.trim().to_string(), Vec::new())
    } else {
        debug!(%url, content_type = ?raw.content_type, "binary content, skipping link extraction");
        (None, String::new(), Vec::new())
    };

    FetchedPage {
        url: url.clone(),
        final_url: raw.final_url,
        depth,
        status_code: raw.status_code,
        content_type: raw.content_type,
        markup,
        content_hash: compute_hash(&raw.body),
        body: raw.body,
        text,
        title,
        links,
        fetched_at: Utc::now(),
    }
}

/// Missing content types are sniffed as HTML.
fn is_markup(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| ct.to_ascii_lowercase().contains("html"))
}

fn is_text(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/"))
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod crawler_tests {
    use std::collections::HashSet;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            concurrency: 4,
            timeout_ms: 2_000,
            max_redirects: 5,
            rate_limit_ms: 0,
            max_pages: 200,
            user_agent: "webai-test".into(),
        }
    }

    /// An HTML page with a heading and the given hrefs.
    fn page(title: &str, hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{h}">{h}</a>"#))
            .collect();
        format!("<html><head><title>{title}</title></head><body><main><h1>{title}</h1>{anchors}</main></body></html>")
    }

    fn html(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
    }

    async fn mount_page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(body))
            .mount(server)
            .await;
    }

    fn url_strings(result: &CrawlResult) -> Vec<String> {
        result.pages.iter().map(|p| p.url.to_string()).collect()
    }

    /// Host, uniqueness and depth invariants every result must satisfy.
    fn assert_invariants(result: &CrawlResult) {
        let mut seen = HashSet::new();
        for page in &result.pages {
            assert_eq!(page.url.host_str(), result.seed.host_str());
            assert!(seen.insert(normalize_url(&page.url).to_string()), "duplicate {}", page.url);
            assert!(page.depth <= result.max_depth);
        }
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash("hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_scope_is_host_exact() {
        let seed = Url::parse("https://example.com/").unwrap();
        let scope = CrawlScope::new(&seed);

        assert!(scope.in_scope(&Url::parse("https://example.com/about").unwrap()));
        assert!(scope.in_scope(&Url::parse("http://EXAMPLE.com/x").unwrap()));
        assert!(!scope.in_scope(&Url::parse("https://docs.example.com/").unwrap()));
        assert!(!scope.in_scope(&Url::parse("https://notexample.com/").unwrap()));
        assert!(!scope.in_scope(&Url::parse("https://other.com/x").unwrap()));
        assert!(!scope.in_scope(&Url::parse("ftp://example.com/file").unwrap()));
    }

    #[test]
    fn test_markup_detection() {
        assert!(is_markup(None));
        assert!(is_markup(Some("text/html; charset=utf-8")));
        assert!(is_markup(Some("application/xhtml+xml")));
        assert!(!is_markup(Some("application/pdf")));
        assert!(!is_markup(Some("text/plain")));
        assert!(is_text(Some("text/plain")));
        assert!(!is_text(Some("image/png")));
    }

    #[tokio::test]
    async fn test_malformed_seed_fails_cleanly() {
        let crawler = Crawler::new(test_config()).unwrap();

        for seed in ["not a url", "mailto:team@example.com", "file:///etc/hosts"] {
            let err = crawler.crawl(seed, 2).await.unwrap_err();
            assert!(err.is_seed_unreachable(), "{seed}: {err}");
        }
    }

    #[tokio::test]
    async fn test_scenario_a_drops_out_of_scope_links() {
        let server = MockServer::start().await;
        let about = format!("{}/about", server.uri());

        mount_page(&server, "/", page("Home", &[&about, "https://other.com/x"])).await;
        mount_page(&server, "/about", page("About", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 2).await.unwrap();

        assert_eq!(
            url_strings(&result),
            vec![format!("{}/", server.uri()), about]
        );
        assert_eq!(result.links_rejected, 1);
        assert!(result.failures.is_empty());
        assert_eq!(result.state, CrawlState::Completed);
        assert_invariants(&result);
    }

    #[tokio::test]
    async fn test_scenario_b_seed_timeout_is_unreachable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(page("Slow", &[])).set_delay(Duration::from_millis(1_500)))
            .expect(2)
            .mount(&server)
            .await;

        let config = CrawlConfig {
            timeout_ms: 300,
            ..test_config()
        };
        let crawler = Crawler::new(config).unwrap();
        let err = crawler.crawl(&server.uri(), 2).await.unwrap_err();

        assert!(err.is_seed_unreachable());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_seed_http_error_is_unreachable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let err = crawler.crawl(&server.uri(), 1).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_scenario_c_self_link_fetched_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(page("Loop", &["/", "/#top", "./"])))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 5).await.unwrap();

        assert_eq!(result.pages.len(), 1);
        assert_invariants(&result);
    }

    #[tokio::test]
    async fn test_scenario_d_shared_child_appears_once() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/a", "/b"])).await;
        mount_page(&server, "/a", page("A", &["/c"])).await;
        mount_page(&server, "/b", page("B", &["/c/"])).await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(html(page("C", &["/a"])))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 3).await.unwrap();

        let base = server.uri();
        assert_eq!(
            url_strings(&result),
            vec![
                format!("{base}/"),
                format!("{base}/a"),
                format!("{base}/b"),
                format!("{base}/c"),
            ]
        );
        let depths: Vec<u32> = result.pages.iter().map(|p| p.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 2]);
        assert_invariants(&result);
    }

    #[tokio::test]
    async fn test_depth_one_follows_exactly_one_hop() {
        let server = MockServer::start().await;

        let children: Vec<String> = (0..10).map(|i| format!("/p{i}")).collect();
        let hrefs: Vec<&str> = children.iter().map(String::as_str).collect();
        mount_page(&server, "/", page("Root", &hrefs)).await;
        for child in &children {
            mount_page(&server, child, page(child, &["/deep"])).await;
        }
        Mock::given(method("GET"))
            .and(path("/deep"))
            .respond_with(html(page("Deep", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 1).await.unwrap();

        // Seed at depth 0 plus its ten links at depth 1
        assert_eq!(result.pages.len(), 11);
        assert_eq!(result.pages[0].depth, 0);
        assert!(result.pages[1..].iter().all(|p| p.depth == 1));
        // Terminal pages are not mined for links
        assert!(result.pages[1..].iter().all(|p| p.links.is_empty()));
        assert_invariants(&result);
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_seed_only() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/a"])).await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html(page("A", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 0).await.unwrap();
        assert_eq!(result.pages.len(), 1);
    }

    #[tokio::test]
    async fn test_depth_bound_on_chain() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("0", &["/1"])).await;
        mount_page(&server, "/1", page("1", &["/2"])).await;
        mount_page(&server, "/2", page("2", &["/3"])).await;
        Mock::given(method("GET"))
            .and(path("/3"))
            .respond_with(html(page("3", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 2).await.unwrap();

        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.pages.last().map(|p| p.depth), Some(2));
        assert_invariants(&result);
    }

    #[tokio::test]
    async fn test_crawl_is_idempotent() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/x", "/y", "/z"])).await;
        mount_page(&server, "/x", page("X", &["/y", "/w"])).await;
        mount_page(&server, "/y", page("Y", &["/z"])).await;
        mount_page(&server, "/z", page("Z", &["/"])).await;
        mount_page(&server, "/w", page("W", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let first = crawler.crawl(&server.uri(), 3).await.unwrap();
        let second = crawler.crawl(&server.uri(), 3).await.unwrap();

        assert_eq!(url_strings(&first), url_strings(&second));
        assert_eq!(first.pages.len(), 5);
        assert_invariants(&first);
    }

    #[tokio::test]
    async fn test_page_ceiling_stops_crawl() {
        let server = MockServer::start().await;

        let children: Vec<String> = (0..10).map(|i| format!("/p{i}")).collect();
        let hrefs: Vec<&str> = children.iter().map(String::as_str).collect();
        mount_page(&server, "/", page("Root", &hrefs)).await;
        for child in &children {
            mount_page(&server, child, page(child, &[])).await;
        }

        let config = CrawlConfig {
            max_pages: 3,
            ..test_config()
        };
        let crawler = Crawler::new(config).unwrap();
        let result = crawler.crawl(&server.uri(), 2).await.unwrap();

        let base = server.uri();
        assert_eq!(
            url_strings(&result),
            vec![format!("{base}/"), format!("{base}/p0"), format!("{base}/p1")]
        );
        assert!(result.hit_page_limit);
    }

    #[tokio::test]
    async fn test_failed_page_is_absorbed() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/missing", "/ok"])).await;
        mount_page(&server, "/ok", page("Ok", &[])).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 2).await.unwrap();

        assert_eq!(
            url_strings(&result),
            vec![format!("{}/", server.uri()), format!("{}/ok", server.uri())]
        );
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].reason, PageFailure::Status(404));
        assert_eq!(result.failures[0].depth, 1);
        assert_eq!(result.state, CrawlState::Completed);
    }

    #[tokio::test]
    async fn test_child_timeout_is_retried_once_then_recorded() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/slow"])).await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(html(page("Slow", &[])).set_delay(Duration::from_millis(1_500)))
            .expect(2)
            .mount(&server)
            .await;

        let config = CrawlConfig {
            timeout_ms: 300,
            ..test_config()
        };
        let crawler = Crawler::new(config).unwrap();
        let result = crawler.crawl(&server.uri(), 1).await.unwrap();

        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.failures[0].reason, PageFailure::Timeout);
    }

    #[tokio::test]
    async fn test_non_markup_skips_extraction() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/notes.txt"])).await;
        Mock::given(method("GET"))
            .and(path("/notes.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"plain notes <a href="/hidden">x</a>"#, "text/plain"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/hidden"))
            .respond_with(html(page("Hidden", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 3).await.unwrap();

        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.extraction_skipped, 1);
        assert!(!result.pages[1].markup);
        assert!(result.pages[1].text.starts_with("plain notes"));
    }

    #[tokio::test]
    async fn test_redirect_resolves_against_final_url() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page("Root", &["/old/page"])).await;
        Mock::given(method("GET"))
            .and(path("/old/page"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{base}/docs/new")),
            )
            .mount(&server)
            .await;
        mount_page(&server, "/docs/new", page("New", &["next"])).await;
        mount_page(&server, "/docs/next", page("Next", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&base, 3).await.unwrap();

        assert_eq!(
            url_strings(&result),
            vec![
                format!("{base}/"),
                format!("{base}/old/page"),
                format!("{base}/docs/next"),
            ]
        );
        assert_eq!(result.pages[1].final_url.path(), "/docs/new");
        assert_eq!(result.pages[1].title.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn test_off_site_redirect_is_not_ingested() {
        let server = MockServer::start().await;
        let other = MockServer::start().await;
        let base = server.uri();
        let other_port = other.address().port();

        mount_page(&server, "/", page("Root", &["/go", "/local"])).await;
        mount_page(&server, "/local", page("Local", &[])).await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                format!("http://localhost:{other_port}/x"),
            ))
            .mount(&server)
            .await;
        mount_page(&other, "/x", page("Third party", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&base, 2).await.unwrap();

        assert_eq!(
            url_strings(&result),
            vec![format!("{base}/"), format!("{base}/local")]
        );
        assert!(result.pages.iter().all(|p| p.final_url.host_str() == Some("127.0.0.1")));
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].url.path(), "/go");
        assert!(matches!(
            result.failures[0].reason,
            PageFailure::OffSiteRedirect(_)
        ));
    }

    #[tokio::test]
    async fn test_seed_redirecting_off_site_is_unreachable() {
        let server = MockServer::start().await;
        let other = MockServer::start().await;
        let other_port = other.address().port();

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(301).insert_header(
                "location",
                format!("http://localhost:{other_port}/"),
            ))
            .mount(&server)
            .await;
        mount_page(&other, "/", page("Elsewhere", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let err = crawler.crawl(&server.uri(), 1).await.unwrap_err();

        assert!(err.is_seed_unreachable());
    }

    #[tokio::test]
    async fn test_redirect_to_linked_page_is_kept_once() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page("Root", &["/old", "/new"])).await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", format!("{base}/new")))
            .mount(&server)
            .await;
        mount_page(&server, "/new", page("Same content", &[])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&base, 2).await.unwrap();
        assert_invariants(&result);

        let finals: Vec<&str> = result.pages.iter().map(|p| p.final_url.path()).collect();
        assert_eq!(finals, vec!["/", "/new"]);
        assert_eq!(result.documents().len(), 2);
        assert_eq!(result.redirect_duplicates, 1);
    }

    #[tokio::test]
    async fn test_redirect_target_is_not_fetched_again() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page("Root", &["/old"])).await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", format!("{base}/new")))
            .mount(&server)
            .await;
        mount_page(&server, "/new", page("New", &["/new", "/"])).await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&base, 3).await.unwrap();

        assert_eq!(
            url_strings(&result),
            vec![format!("{base}/"), format!("{base}/old")]
        );
        assert_eq!(result.redirect_duplicates, 0);
    }

    #[tokio::test]
    async fn test_documents_carry_page_text() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            "<html><body><p>Grounding text</p><script>track()</script></body></html>".into(),
        )
        .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler.crawl(&server.uri(), 1).await.unwrap();
        let docs = result.documents();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].1, "Grounding text");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html(page("Root", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let crawler = Crawler::new(test_config()).unwrap();
        let result = crawler
            .crawl_with_cancellation(&server.uri(), 3, cancel)
            .await
            .unwrap();

        assert!(result.pages.is_empty());
        assert_eq!(result.state, CrawlState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_inflight_fetches() {
        let server = MockServer::start().await;

        mount_page(&server, "/", page("Root", &["/slow1", "/slow2"])).await;
        for route in ["/slow1", "/slow2"] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(html(page("Slow", &[])).set_delay(Duration::from_secs(3)))
                .mount(&server)
                .await;
        }

        let config = CrawlConfig {
            timeout_ms: 10_000,
            ..test_config()
        };
        let crawler = Crawler::new(config).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = crawler
            .crawl_with_cancellation(&server.uri(), 2, cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result.state, CrawlState::Cancelled);
        assert_eq!(result.pages.len(), 1);
        assert!(result.failures.is_empty());
    }
}
