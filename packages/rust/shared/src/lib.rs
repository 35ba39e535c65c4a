//! Shared error model and configuration for WebAI.
//!
//! This crate is the foundation depended on by all other WebAI crates.
//! It provides:
//! - [`WebAiError`]: the unified error type
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, IngestSection, MAX_DEPTH, MIN_DEPTH, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_depth,
};
pub use error::{Result, WebAiError};
