//! Visible text and title extraction from fetched pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node, Selector};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static H1_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\f\v]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

/// Elements that start a new line of text.
fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "table"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "nav"
            | "main"
            | "aside"
            | "pre"
            | "blockquote"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

/// Page title: `<title>` first, then the first `<h1>`.
pub fn extract_title(doc: &Html) -> Option<String> {
    [&*TITLE_SEL, &*H1_SEL].into_iter().find_map(|sel| {
        doc.select(sel)
            .next()
            .map(|el| collapse_inline(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

/// Extract the readable text of a document.
///
/// Scripts, styles and other non-rendered elements are skipped. Block
/// elements become line breaks; runs of blank lines collapse to a single
/// paragraph break.
pub fn extract_text(doc: &Html) -> String {
    let root = doc
        .select(&BODY_SEL)
        .next()
        .map(|body| *body)
        .unwrap_or_else(|| doc.tree.root());

    let mut out = String::new();

    for node in root.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if is_block(el.name()) => out.push('\n'),
            _ => {}
        }
    }

    tidy(&out)
}

/// Collapse whitespace inside lines and squeeze blank lines.
fn tidy(raw: &str) -> String {
    let lines: Vec<String> = raw.lines().map(collapse_inline).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n\n").trim().to_string()
}

fn collapse_inline(s: &str) -> String {
    INLINE_WS.replace_all(s, " ").trim().to_string()
}
