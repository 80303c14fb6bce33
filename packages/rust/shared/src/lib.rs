//! Shared types, error model, and configuration for SheetLoad.
//!
//! This crate is the foundation depended on by all other SheetLoad crates.
//! It provides:
//! - [`SheetloadError`], the unified error type
//! - Domain types ([`JobSpec`], [`TableId`], [`ColumnSchema`], [`RawGrid`], [`TypedTable`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod table;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, NotifyConfig, PathsConfig, ServerConfig, SourceConfig, config_dir,
    config_file_path, env_value, init_config, load_config, load_config_from,
};
pub use error::{Result, SheetloadError};
pub use table::{CellValue, NormalizedTable, PipelineWarning, RawGrid, TypedTable};
pub use types::{ColumnDef, ColumnSchema, ColumnType, JobSpec, SheetLocation, TableId};
