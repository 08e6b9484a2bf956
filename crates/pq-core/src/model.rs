//! Data model shared between the data layer and the UI boundary

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata for one parquet file, extracted from the footer only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub num_rows: i64,
    pub num_columns: usize,
    /// Columns in file order; result rows always follow this order.
    pub columns: Vec<ColumnInfo>,
}

impl FileMetadata {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Per-column schema information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Display type: the logical type when present, otherwise the physical type.
    pub column_type: String,
    pub logical_type: Option<String>,
    pub physical_type: String,
}

impl ColumnInfo {
    /// Whether values of this column are text for quoting purposes.
    pub fn is_string(&self) -> bool {
        match self.logical_type.as_deref() {
            Some(logical) => logical == "STRING" || logical == "ENUM" || logical == "JSON",
            None => self.physical_type == "BYTE_ARRAY",
        }
    }
}

/// Basic filesystem information about one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub is_parquet: bool,
    pub size: Option<u64>,
    pub children: Option<Vec<FileEntry>>,
}

/// Sort direction for paginated reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort request: one column plus a direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// One bounded window of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    /// Boolean expression produced by the filter translator, if any.
    pub filter: Option<String>,
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            filter: None,
            sort: None,
        }
    }
}

/// Projected column of a query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    pub data_type: String,
}

/// Result of an ad hoc query.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    /// Row objects mapping column name to value; NULL is JSON null.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub execution_time_ms: u128,
}

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Request to stream a row set out to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub source_path: PathBuf,
    pub export_path: PathBuf,
    pub format: ExportFormat,
    /// Boolean expression produced by the filter translator, if any.
    pub filter: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Outcome of a completed export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub rows_exported: usize,
    pub bytes_written: u64,
    pub export_path: PathBuf,
}
