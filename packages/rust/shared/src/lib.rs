//! Shared types, error model, and configuration for ResearchKit.
//!
//! This crate is the foundation depended on by all other ResearchKit crates.
//! It provides:
//! - [`ResearchKitError`]: the unified error type
//! - Domain types ([`SearchCandidate`], [`ResearchResult`], [`ResearchOutput`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, RetryConfig, ScrapeConfig, SelectionConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ResearchKitError, Result};
pub use types::{ResearchOutput, ResearchResult, SearchCandidate};
