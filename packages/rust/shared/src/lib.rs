//! Shared types, error model, and configuration for bundlebot.
//!
//! This crate is the foundation depended on by all other bundlebot crates.
//! It provides:
//! - [`BundleError`]: the unified error type
//! - The work model ([`WorkRow`], [`DocumentCode`], [`CellRef`], [`RowOutcome`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, ManifestConfig, MergeConfig, PathsConfig, PipelineConfig,
    config_dir, config_file_path, init_config, init_config_at, load_config, load_config_from,
};
pub use error::{BundleError, Result};
pub use types::{
    CellRef, DocumentCode, FetchedDocument, MergePolicy, ResolvedLocation, RowOutcome, RowStatus,
    WorkRow,
};
