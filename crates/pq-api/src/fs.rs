//! Filesystem browsing collaborators for the file-picker side of the UI

use std::path::Path;

use pq_core::{DataError, FileEntry, FileInfo, Result};

/// Basic information about one file.
pub fn file_info(path: &Path) -> Result<FileInfo> {
    let metadata = std::fs::metadata(path).map_err(|e| DataError::io(path, e))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string();

    Ok(FileInfo {
        path: path.to_string_lossy().to_string(),
        name,
        size: metadata.len(),
    })
}

/// Non-recursive listing of one directory, directories first, then files,
/// case-insensitive alphabetical within each group.
pub fn list_directory(path: &Path) -> Result<Vec<FileEntry>> {
    if !path.exists() {
        return Err(DataError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(DataError::Io {
            path: path.to_path_buf(),
            message: "path is not a directory".into(),
        });
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| DataError::io(path, e))? {
        let entry = entry.map_err(|e| DataError::io(path, e))?;
        let entry_path = entry.path();
        let metadata = entry.metadata().map_err(|e| DataError::io(&entry_path, e))?;

        let is_directory = metadata.is_dir();
        let is_parquet = !is_directory && is_parquet_path(&entry_path);

        entries.push(FileEntry {
            path: entry_path.to_string_lossy().to_string(),
            name: entry.file_name().to_string_lossy().to_string(),
            is_directory,
            is_parquet,
            size: if is_directory {
                None
            } else {
                Some(metadata.len())
            },
            children: None,
        });
    }

    entries.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    Ok(entries)
}

fn is_parquet_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false)
}
