//! Shared types, error model, and configuration for Tidewatch.
//!
//! This crate is the foundation depended on by all other Tidewatch crates.
//! It provides:
//! - [`TidewatchError`]: the unified error type
//! - Domain types ([`SearchItem`], [`MentionRecord`])
//! - Configuration ([`AppConfig`], [`IngestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_QUERY, DatabaseConfig, DatabaseTarget, IngestConfig, PollConfig,
    TwitterConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_bearer_token, resolve_database, validate_config,
};
pub use error::{Result, TidewatchError};
pub use types::{DEFAULT_SOURCE_TAG, Geo, GeoPoint, MentionRecord, SearchItem};
