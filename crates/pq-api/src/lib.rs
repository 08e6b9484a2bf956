//! Stable contract consumed by the UI layer
//!
//! [`DataService`] is the one owned service object the UI holds; every tab
//! and dialog calls through it, and it owns the process-wide file cache.
//! Filesystem browsing helpers live in [`fs`] — collaborators of the data
//! layer, not part of it.

pub mod fs;

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use pq_core::{
    translate_conditions, ExportRequest, ExportSummary, FileEntry, FileInfo, FileMetadata,
    FilterCondition, PageRequest, QueryResult, Result, SortDirection, SortSpec,
};
use pq_data::{DataConfig, FileCache};

/// Facade over the data layer, passed by handle to all callers.
pub struct DataService {
    cache: Arc<FileCache>,
}

impl DataService {
    pub fn new(config: DataConfig) -> Self {
        Self {
            cache: Arc::new(FileCache::new(config)),
        }
    }

    /// The underlying cache, for embedders that need lifecycle state.
    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    pub fn check_file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Open a file (or refresh an already-open one) and return its
    /// metadata. Cheap enough to call on every tab activation.
    pub async fn open_parquet_file(&self, path: &Path) -> Result<Arc<FileMetadata>> {
        self.cache.open(path).await
    }

    pub fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        fs::file_info(path)
    }

    pub fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>> {
        fs::list_directory(path)
    }

    /// Read one page of rows, optionally filtered and sorted.
    pub async fn read_parquet_data(
        &self,
        path: &Path,
        offset: usize,
        limit: usize,
        filter: Option<String>,
        sort_column: Option<String>,
        sort_direction: Option<SortDirection>,
    ) -> Result<Vec<Map<String, Value>>> {
        let lease = self.cache.acquire(path).await?;
        let request = PageRequest {
            offset,
            limit,
            filter,
            sort: sort_column.map(|column| SortSpec {
                column,
                direction: sort_direction.unwrap_or(SortDirection::Asc),
            }),
        };
        pq_data::read_page(&lease, &request, self.cache.config()).await
    }

    /// Count rows matching an optional filter without materializing them.
    pub async fn count_parquet_data(&self, path: &Path, filter: Option<String>) -> Result<usize> {
        let lease = self.cache.acquire(path).await?;
        pq_data::count(&lease, filter.as_deref()).await
    }

    /// Run one read-only SQL statement against the file's virtual table `t`.
    pub async fn execute_sql(&self, path: &Path, query: &str) -> Result<QueryResult> {
        let lease = self.cache.acquire(path).await?;
        pq_data::execute(&lease, query, self.cache.config()).await
    }

    /// Stream a (optionally filtered, optionally windowed) row set to disk.
    pub async fn export_data(&self, request: &ExportRequest) -> Result<ExportSummary> {
        let lease = self.cache.acquire(&request.source_path).await?;
        pq_data::export(&lease, request, self.cache.config()).await
    }

    /// Drop cached state for a path. Safe to call for paths that were
    /// never opened; entries still serving reads are evicted on the last
    /// release.
    pub fn evict_cache(&self, path: &Path) {
        debug!(path = %path.display(), "evict requested");
        self.cache.evict(path);
    }

    /// Translate structured UI conditions into the filter expression the
    /// read, count, and export calls accept.
    pub async fn translate_filter(
        &self,
        path: &Path,
        conditions: &[FilterCondition],
    ) -> Result<Option<String>> {
        let metadata = self.cache.open(path).await?;
        Ok(translate_conditions(conditions, &metadata))
    }
}

impl Default for DataService {
    fn default() -> Self {
        Self::new(DataConfig::default())
    }
}
