//! Core types for the parquet inspection layer
//!
//! This crate is I/O-free: it holds the data model shared across the
//! workspace, the error taxonomy, and the pure filter translator.
//! Everything that touches disk lives in `pq-data`.

pub mod error;
pub mod filter;
pub mod model;

// Re-export commonly used types
pub use error::DataError;
pub use filter::{translate_conditions, FilterCondition, FilterOperator};
pub use model::{
    ColumnInfo, ExportFormat, ExportRequest, ExportSummary, FileEntry, FileInfo, FileMetadata,
    PageRequest, QueryColumn, QueryResult, SortDirection, SortSpec,
};

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DataError>;
