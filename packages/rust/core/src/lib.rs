//! Core session and ingestion logic for WebAI.
//!
//! This crate turns crawl output and uploaded text into chunked documents
//! (`pipeline::ingest`) and keeps per-user state in an explicit
//! [`session::Session`].

pub mod document;
pub mod pipeline;
pub mod session;
pub mod splitter;
pub mod transcript;
