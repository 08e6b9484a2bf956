//! Error taxonomy shared by every component

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced to the caller of the data layer.
///
/// Every variant carries the path it originated from, so a failure in one
/// tab can be routed back to that tab alone.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a parquet file: {path}: {message}")]
    NotAParquetFile { path: PathBuf, message: String },

    #[error("corrupt parquet file: {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("file changed on disk since open: {path}")]
    StaleHandle { path: PathBuf },

    #[error("parse error for {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("execution failed for {path}: {message}")]
    Execution { path: PathBuf, message: String },

    #[error("result for {path} exceeds the cap of {cap} rows")]
    ResultTooLarge { path: PathBuf, cap: usize },

    #[error("operation on {path} timed out after {timeout_ms} ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("encoding error on {path}: {message}")]
    Encoding { path: PathBuf, message: String },
}

impl DataError {
    /// Wrap a std I/O error, promoting `NotFound` to its own kind.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => DataError::NotFound { path },
            _ => DataError::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    /// Stable machine-readable kind, consumed by the UI boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            DataError::NotFound { .. } => "NotFound",
            DataError::NotAParquetFile { .. } => "NotAParquetFile",
            DataError::Corrupt { .. } => "Corrupt",
            DataError::StaleHandle { .. } => "StaleHandle",
            DataError::Parse { .. } => "ParseError",
            DataError::Execution { .. } => "ExecutionError",
            DataError::ResultTooLarge { .. } => "ResultTooLarge",
            DataError::Timeout { .. } => "Timeout",
            DataError::Io { .. } => "IoError",
            DataError::Encoding { .. } => "EncodingError",
        }
    }

    /// Path the failure originated from.
    pub fn path(&self) -> &Path {
        match self {
            DataError::NotFound { path }
            | DataError::NotAParquetFile { path, .. }
            | DataError::Corrupt { path, .. }
            | DataError::StaleHandle { path }
            | DataError::Parse { path, .. }
            | DataError::Execution { path, .. }
            | DataError::ResultTooLarge { path, .. }
            | DataError::Timeout { path, .. }
            | DataError::Io { path, .. }
            | DataError::Encoding { path, .. } => path,
        }
    }
}
