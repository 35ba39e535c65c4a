//! Application configuration for WebAI.
//!
//! User config lives at `~/.webai/webai.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WebAiError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "webai.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".webai";

/// Smallest and largest depth a user may select.
pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 5;

// ---------------------------------------------------------------------------
// Config structs (matching webai.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawler settings.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Text splitting settings for ingestion.
    #[serde(default)]
    pub ingest: IngestSection,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Default maximum number of hops from the seed.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum concurrent HTTP requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirect hops per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Pacing delay before each request, in milliseconds.
    #[serde(default)]
    pub rate_limit_ms: u64,

    /// Global ceiling on successfully fetched pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            rate_limit_ms: 0,
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_depth() -> u32 {
    1
}
fn default_concurrency() -> u32 {
    4
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_max_redirects() -> usize {
    5
}
fn default_max_pages() -> usize {
    200
}
fn default_user_agent() -> String {
    concat!("WebAI/", env!("CARGO_PKG_VERSION")).into()
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over between neighbouring chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    50
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file + CLI flags.
///
/// The crawl depth is not part of this struct: it is supplied per crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum redirect hops per request.
    pub max_redirects: usize,
    /// Pacing delay before each request, in milliseconds.
    pub rate_limit_ms: u64,
    /// Global ceiling on successfully fetched pages.
    pub max_pages: usize,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.crawl.concurrency.max(1),
            timeout_ms: config.crawl.timeout_ms,
            max_redirects: config.crawl.max_redirects,
            rate_limit_ms: config.crawl.rate_limit_ms,
            max_pages: config.crawl.max_pages.max(1),
            user_agent: config.crawl.user_agent.clone(),
        }
    }
}

/// Check that a user-selected depth is within `MIN_DEPTH..=MAX_DEPTH`.
pub fn validate_depth(depth: u32) -> Result<u32> {
    if (MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        Ok(depth)
    } else {
        Err(WebAiError::validation(format!(
            "max_depth {depth} is outside {MIN_DEPTH}..={MAX_DEPTH}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.webai/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| WebAiError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.webai/webai.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WebAiError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| WebAiError::config(format!("failed to parse {}: {e}", path.display())))?;

    validate_depth(config.crawl.max_depth)
        .map_err(|e| WebAiError::config(format!("{}: {e}", path.display())))?;

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WebAiError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| WebAiError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WebAiError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
