//! # Dataprep - tabular preprocessing with reproducible pandas output
//!
//! Dataprep loads CSV or Parquet files into a typed in-memory table, applies
//! cleaning and feature operations one at a time, and records for each step
//! the pandas statement that reproduces it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV/Parquet │────▶│    Table    │────▶│  Operation  │────▶│ CSV/Parquet │
//! │  (auto-enc) │     │   (typed)   │     │  (history)  │     │  + pandas   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dataprep::{LoadCache, LoadOptions, Operation, Session};
//!
//! let bytes = std::fs::read("people.csv")?;
//! let cache = LoadCache::new();
//! let mut session = Session::new();
//! session.load(&cache, "people.csv", &bytes, &LoadOptions::default())?;
//! session.apply(&Operation::DropDuplicates)?;
//! print!("{}", session.generated_code());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - Typed columns, cells and the table value
//! - [`io`] - CSV/Parquet loading and export with auto-detection
//! - [`stats`] - Describe, missing values, correlation
//! - [`transform`] - Cleaning, features, the operation DSL and recipes
//! - [`codegen`] - pandas script rendering
//! - [`session`] - Per-user state: table, history, source
//! - [`cache`] - Parsed-upload cache
//! - [`config`] - Environment configuration
//! - [`logging`] - Console and rolling-file tracing setup
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod table;

// Loading and export
pub mod io;

// Analysis
pub mod stats;

// Transformation
pub mod transform;
pub mod codegen;

// State
pub mod session;
pub mod cache;
pub mod config;
pub mod logging;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExportError, LoadError, OpError, PipelineError, ServerError, SessionError,
};

// =============================================================================
// Re-exports - Table
// =============================================================================

pub use table::{Column, ColumnData, ColumnKind, Table, Value};

// =============================================================================
// Re-exports - IO
// =============================================================================

pub use io::{
    export, fingerprint, load, load_file, preview, FileFormat, LoadOptions, Loaded, SourceInfo,
};

// =============================================================================
// Re-exports - Stats
// =============================================================================

pub use stats::{correlation, describe, missing_info, CorrelationMethod};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    example_recipe, operations_description, process_file, run_recipe, Axis, CombineOp,
    FillMethod, Operation, Recipe, RunReport, ScaleMethod, TargetKind,
};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use cache::{CacheStats, LoadCache};
pub use config::AppConfig;
pub use session::{LoadOutcome, Session, SessionSummary};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
