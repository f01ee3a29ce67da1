//! Shared types, error model, and configuration for Courseware.
//!
//! This crate is the foundation depended on by all other Courseware crates.
//! It provides:
//! - [`CoursewareError`]: the unified error type
//! - Domain types ([`BlockId`], [`Block`], [`BlockGroup`], [`LoadState`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DownloadsConfig, HostCredential, SearchConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{CoursewareError, Result, SharedError};
pub use types::{
    Block, BlockGroup, BlockId, BlockType, CourseLastAccessed, EmptyIcon, LoadState,
    VideoDownload,
};
