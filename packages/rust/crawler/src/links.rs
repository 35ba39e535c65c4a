//! Hyperlink extraction and URL normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

static BASE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("valid selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href], area[href]").expect("valid selector"));

/// Whether the URL uses a scheme the crawler can fetch.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Normalize a URL for deduplication.
///
/// The `url` parser already lower-cases scheme and host and drops default
/// ports. On top of that the fragment and an empty query are removed, and a
/// trailing slash is stripped from every path except the root.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    if normalized.query() == Some("") {
        normalized.set_query(None);
    }

    let path = normalized.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        normalized.set_path(&trimmed);
    }

    normalized
}

/// Extract every hyperlink target on a page as absolute, normalized URLs.
///
/// Relative references resolve against the document's `<base href>` when
/// present, otherwise against `page_url`. Non-HTTP schemes and unparsable
/// hrefs are dropped. Document order is kept; duplicates are collapsed.
pub fn extract_links(doc: &Html, page_url: &Url) -> Vec<Url> {
    let base = doc
        .select(&BASE_SEL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };

        let Ok(resolved) = base.join(href.trim()) else {
            continue;
        };

        if !is_http(&resolved) {
            continue;
        }

        let normalized = normalize_url(&resolved);
        if seen.insert(normalized.as_str().to_string()) {
            links.push(normalized);
        }
    }

    links
}

/// Parse `html` and extract its links. See [`extract_links`].
pub fn extract_links_from_str(html: &str, page_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    extract_links(&doc, page_url)
}
