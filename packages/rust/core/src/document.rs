//! Documents handed to the downstream embedding stage.

use std::fmt;

use serde::Serialize;
use url::Url;

/// Where a document's content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSource {
    /// A crawled page.
    Web { url: Url },
    /// Text supplied directly by the user (e.g. an uploaded PDF's text).
    Uploaded { name: String },
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web { url } => write!(f, "{url}"),
            Self::Uploaded { name } => write!(f, "uploaded:{name}"),
        }
    }
}

/// A unit of content with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub source: DocumentSource,
    pub content: String,
}

impl Document {
    pub fn web(url: Url, content: impl Into<String>) -> Self {
        Self {
            source: DocumentSource::Web { url },
            content: content.into(),
        }
    }

    pub fn uploaded(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: DocumentSource::Uploaded { name: name.into() },
            content: content.into(),
        }
    }
}
