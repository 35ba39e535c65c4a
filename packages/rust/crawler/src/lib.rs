//! Bounded site crawler and link extraction.
//!
//! This crate provides:
//! - [`links`]: hyperlink extraction and URL normalization
//! - [`engine`]: breadth-first, depth-bounded, host-scoped crawler
//! - [`text`]: readable text and title extraction for fetched pages
//! - [`VisitedSet`]: the per-crawl check-and-set URL registry

pub mod engine;
pub mod links;
pub mod text;
mod visited;

pub use engine::{
    CrawlResult, CrawlState, Crawler, FailedPage, FetchedPage, PageFailure, PageOutcome,
};
pub use links::{extract_links, extract_links_from_str, normalize_url};
pub use visited::VisitedSet;
