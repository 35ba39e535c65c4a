//! Per-crawl set of claimed URLs.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use crate::links::normalize_url;

/// URLs already fetched or enqueued during one crawl.
///
/// Cloning yields another handle to the same set. The set only grows.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `url`. Returns `true` only for the first caller to claim its
    /// normalized form; the check and the insert happen under one lock.
    pub async fn insert(&self, url: &Url) -> bool {
        let key = normalize_url(url).to_string();
        self.inner.lock().await.insert(key)
    }

    pub async fn contains(&self, url: &Url) -> bool {
        let key = normalize_url(url).to_string();
        self.inner.lock().await.contains(&key)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
