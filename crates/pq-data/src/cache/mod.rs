//! Process-wide cache of open parquet files
//!
//! One [`CacheEntry`] per canonical path, reference-counted so one tab's
//! close never invalidates another tab's in-flight read. The map mutex is
//! the only serialized section in the workspace and is held for
//! bookkeeping updates only, never across I/O: sessions are built outside
//! the lock and reads run on cloned session handles.

use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use ahash::AHashMap;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::{ParquetReadOptions, SessionConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use pq_core::{DataError, FileMetadata, Result};

use crate::config::DataConfig;
use crate::schema;

/// Fixed name of the single read-only virtual table each file is exposed as.
pub const TABLE_NAME: &str = "t";

/// Externally observable lifecycle state of a cached path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Open,
    EvictPending,
    Stale,
}

/// Size and modification time captured when a file is opened; a mismatch on
/// a later access means the backing file changed underneath us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiskStat {
    len: u64,
    modified: SystemTime,
}

fn disk_stat(path: &Path) -> Result<DiskStat> {
    let md = std::fs::metadata(path).map_err(|e| DataError::io(path, e))?;
    let modified = md.modified().map_err(|e| DataError::io(path, e))?;
    Ok(DiskStat {
        len: md.len(),
        modified,
    })
}

struct CacheEntry {
    ctx: SessionContext,
    metadata: Arc<FileMetadata>,
    captured: DiskStat,
    open_count: usize,
    evict_pending: bool,
    stale: bool,
    last_access: Instant,
}

impl CacheEntry {
    fn matches(&self, disk: DiskStat) -> bool {
        self.captured == disk
    }

    fn state(&self) -> EntryState {
        if self.stale {
            EntryState::Stale
        } else if self.evict_pending {
            EntryState::EvictPending
        } else {
            EntryState::Open
        }
    }
}

/// The open-file cache. Owned service object: callers hold an `Arc` and
/// never reach it through globals.
pub struct FileCache {
    config: DataConfig,
    entries: Mutex<AHashMap<PathBuf, CacheEntry>>,
}

impl FileCache {
    pub fn new(config: DataConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(AHashMap::new()),
        }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Open (or refresh) a file and return its metadata. Repeat opens of a
    /// still-valid entry are cache hits; a stale entry is rebuilt in place,
    /// carrying its reference count across the rebuild.
    pub async fn open(self: &Arc<Self>, path: &Path) -> Result<Arc<FileMetadata>> {
        let canon = canonicalize(path)?;
        let disk = disk_stat(&canon)?;

        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&canon) {
                if !entry.stale && entry.matches(disk) {
                    debug!(path = %canon.display(), "cache hit");
                    // A reopening consumer cancels any pending eviction.
                    entry.evict_pending = false;
                    entry.last_access = Instant::now();
                    return Ok(entry.metadata.clone());
                }
                entry.stale = true;
            }
        }

        // Build the replacement outside the critical section.
        let built = build_entry(&canon, disk).await?;
        let metadata = built.metadata.clone();

        let mut entries = self.entries.lock();
        match entries.get_mut(&canon) {
            // Someone else rebuilt while we were out of the lock.
            Some(existing) if !existing.stale && existing.matches(disk) => {
                Ok(existing.metadata.clone())
            }
            Some(existing) => {
                let mut built = built;
                built.open_count = existing.open_count;
                built.evict_pending = existing.evict_pending;
                info!(path = %canon.display(), "reopened stale entry");
                *existing = built;
                Ok(metadata)
            }
            None => {
                info!(path = %canon.display(), rows = metadata.num_rows, "opened");
                entries.insert(canon, built);
                Ok(metadata)
            }
        }
    }

    /// Borrow a reader for one call. Opens on miss, validates the entry
    /// against the disk file, and increments the reference count; the
    /// returned lease releases on drop.
    pub async fn acquire(self: &Arc<Self>, path: &Path) -> Result<ReaderLease> {
        let canon = canonicalize(path)?;
        let disk = disk_stat(&canon)?;

        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&canon) {
                if entry.stale || !entry.matches(disk) {
                    if !entry.stale {
                        warn!(path = %canon.display(), "backing file changed on disk");
                        entry.stale = true;
                    }
                    return Err(DataError::StaleHandle { path: canon });
                }
                return Ok(self.lease_from(&canon, entry));
            }
        }

        let built = build_entry(&canon, disk).await?;
        let mut entries = self.entries.lock();
        let entry = match entries.entry(canon.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                info!(path = %canon.display(), rows = built.metadata.num_rows, "opened");
                vacant.insert(built)
            }
        };
        if entry.stale {
            return Err(DataError::StaleHandle { path: canon });
        }
        let lease = self.lease_from(&canon, entry);
        Ok(lease)
    }

    fn lease_from(self: &Arc<Self>, canon: &Path, entry: &mut CacheEntry) -> ReaderLease {
        entry.open_count += 1;
        // A new consumer cancels any pending eviction.
        entry.evict_pending = false;
        entry.last_access = Instant::now();
        ReaderLease {
            cache: self.clone(),
            path: canon.to_path_buf(),
            ctx: entry.ctx.clone(),
            metadata: entry.metadata.clone(),
        }
    }

    fn release_canonical(&self, canon: &Path) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(canon) {
            entry.open_count = entry.open_count.saturating_sub(1);
            if entry.open_count == 0 && entry.evict_pending {
                entries.remove(canon);
                info!(path = %canon.display(), "completed deferred eviction");
            }
        }
    }

    /// Remove a path from the cache. Entries still referenced are marked
    /// for eviction and removed on the last release. Idempotent, including
    /// for paths that were never opened.
    pub fn evict(&self, path: &Path) {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            None => debug!(path = %key.display(), "evict: not cached"),
            Some(entry) if entry.open_count > 0 => {
                warn!(path = %key.display(), open_count = entry.open_count, "deferring eviction");
                entry.evict_pending = true;
            }
            Some(entry) => {
                let idle_ms = entry.last_access.elapsed().as_millis() as u64;
                entries.remove(&key);
                info!(path = %key.display(), idle_ms, "evicted");
            }
        }
    }

    /// Lifecycle state of a cached path; `None` means not cached (Closed).
    pub fn state(&self, path: &Path) -> Option<EntryState> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.entries.lock().get(&key).map(|e| e.state())
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| DataError::io(path, e))
}

async fn build_entry(canon: &Path, disk: DiskStat) -> Result<CacheEntry> {
    let metadata = Arc::new(schema::read_metadata(canon)?);

    let path_str = canon.to_str().ok_or_else(|| DataError::Io {
        path: canon.to_path_buf(),
        message: "path is not valid UTF-8".into(),
    })?;

    // One target partition keeps unsorted scans in file order, which
    // pagination by LIMIT/OFFSET depends on.
    let ctx = SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1));
    ctx.register_parquet(TABLE_NAME, path_str, ParquetReadOptions::default())
        .await
        .map_err(|e| DataError::Corrupt {
            path: canon.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(CacheEntry {
        ctx,
        metadata,
        captured: disk,
        open_count: 0,
        evict_pending: false,
        stale: false,
        last_access: Instant::now(),
    })
}

/// A reader borrowed from the cache for the duration of one call.
///
/// Holds a cloned session handle (cheap; `SessionContext` is `Arc`-backed)
/// plus the file metadata captured at open. Dropping the lease releases the
/// reference count, which may complete a deferred eviction.
pub struct ReaderLease {
    cache: Arc<FileCache>,
    path: PathBuf,
    ctx: SessionContext,
    metadata: Arc<FileMetadata>,
}

impl std::fmt::Debug for ReaderLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderLease")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ReaderLease {
    pub fn ctx(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Canonical path of the backing file, for error reporting.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ReaderLease {
    fn drop(&mut self) {
        self.cache.release_canonical(&self.path);
    }
}
