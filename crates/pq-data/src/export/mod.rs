//! Streaming export of a row set to CSV or JSON
//!
//! Rows stream through the same single-table statement the reader uses and
//! are encoded batch by batch, so memory stays independent of file size.
//! Output lands in a sibling temp file and is renamed into place only on
//! success; a failed or cancelled export leaves nothing under the final
//! name.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use pq_core::{DataError, ExportFormat, ExportRequest, ExportSummary, Result};

use crate::cache::ReaderLease;
use crate::config::DataConfig;
use crate::query::parse_single_query;
use crate::reader::build_select;
use crate::rows;

/// UTF-8 byte order mark, for spreadsheet tools that want one.
const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Stream the requested row set to `request.export_path`.
pub async fn export(
    lease: &ReaderLease,
    request: &ExportRequest,
    config: &DataConfig,
) -> Result<ExportSummary> {
    let path = lease.path().to_path_buf();
    let dest = request.export_path.clone();

    let sql = build_select(
        request.filter.as_deref(),
        None,
        request.offset,
        request.limit,
    );
    parse_single_query(&sql, &path)?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(&parent).map_err(|e| DataError::Io {
        path: dest.clone(),
        message: format!("cannot stage export next to destination: {}", e),
    })?;

    let columns: Vec<String> = lease
        .metadata()
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect();

    let run = async {
        let writer = BufWriter::new(temp.as_file().try_clone().map_err(|e| DataError::Io {
            path: dest.clone(),
            message: e.to_string(),
        })?);
        let mut encoder = RowEncoder::new(request.format, writer, columns, &dest)?;

        let df = lease.ctx().sql(&sql).await.map_err(|e| DataError::Execution {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mut stream = df
            .execute_stream()
            .await
            .map_err(|e| DataError::Execution {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut exported = 0usize;
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| DataError::Execution {
                path: path.clone(),
                message: e.to_string(),
            })?;
            for row in rows::batch_to_rows(&batch, &path)? {
                encoder.write_row(&row)?;
            }
            exported += batch.num_rows();
        }
        encoder.finish()?;
        Ok(exported)
    };

    let rows_exported = tokio::time::timeout(Duration::from_millis(config.export_timeout_ms), run)
        .await
        .map_err(|_| DataError::Timeout {
            path: path.clone(),
            timeout_ms: config.export_timeout_ms,
        })??;

    let bytes_written = temp
        .as_file()
        .metadata()
        .map_err(|e| DataError::Io {
            path: dest.clone(),
            message: e.to_string(),
        })?
        .len();

    temp.persist(&dest).map_err(|e| DataError::Io {
        path: dest.clone(),
        message: e.error.to_string(),
    })?;

    info!(source = %path.display(), dest = %dest.display(), rows = rows_exported, bytes = bytes_written, "export complete");

    Ok(ExportSummary {
        rows_exported,
        bytes_written,
        export_path: dest,
    })
}

/// Incremental row encoder over a buffered writer.
enum RowEncoder<W: Write> {
    Csv {
        writer: csv::Writer<W>,
        columns: Vec<String>,
        dest: PathBuf,
    },
    Json {
        writer: W,
        any_rows: bool,
        dest: PathBuf,
    },
}

impl<W: Write> RowEncoder<W> {
    fn new(format: ExportFormat, mut writer: W, columns: Vec<String>, dest: &Path) -> Result<Self> {
        let io_err = |e: std::io::Error| DataError::Io {
            path: dest.to_path_buf(),
            message: e.to_string(),
        };
        match format {
            ExportFormat::Csv => {
                writer.write_all(&BOM).map_err(io_err)?;
                let mut writer = csv::Writer::from_writer(writer);
                writer
                    .write_record(&columns)
                    .map_err(|e| csv_error(e, dest))?;
                Ok(RowEncoder::Csv {
                    writer,
                    columns,
                    dest: dest.to_path_buf(),
                })
            }
            ExportFormat::Json => {
                writer.write_all(b"[").map_err(io_err)?;
                Ok(RowEncoder::Json {
                    writer,
                    any_rows: false,
                    dest: dest.to_path_buf(),
                })
            }
        }
    }

    fn write_row(&mut self, row: &Map<String, Value>) -> Result<()> {
        match self {
            RowEncoder::Csv {
                writer,
                columns,
                dest,
            } => {
                let record = columns
                    .iter()
                    .map(|c| row.get(c).map(rows::value_to_field).unwrap_or_default());
                writer.write_record(record).map_err(|e| csv_error(e, dest))
            }
            RowEncoder::Json {
                writer,
                any_rows,
                dest,
            } => {
                let io_err = |e: std::io::Error| DataError::Io {
                    path: dest.clone(),
                    message: e.to_string(),
                };
                if *any_rows {
                    writer.write_all(b",\n").map_err(io_err)?;
                } else {
                    writer.write_all(b"\n").map_err(io_err)?;
                    *any_rows = true;
                }
                serde_json::to_writer(&mut *writer, row).map_err(|e| DataError::Encoding {
                    path: dest.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            RowEncoder::Csv { writer, dest, .. } => {
                let inner = writer.into_inner().map_err(|e| DataError::Io {
                    path: dest.clone(),
                    message: e.error().to_string(),
                })?;
                flush_with_retry(inner, &dest)
            }
            RowEncoder::Json {
                mut writer,
                any_rows,
                dest,
            } => {
                let io_err = |e: std::io::Error| DataError::Io {
                    path: dest.clone(),
                    message: e.to_string(),
                };
                if any_rows {
                    writer.write_all(b"\n]").map_err(io_err)?;
                } else {
                    writer.write_all(b"]").map_err(io_err)?;
                }
                flush_with_retry(writer, &dest)
            }
        }
    }
}

fn csv_error(err: csv::Error, dest: &Path) -> DataError {
    if err.is_io_error() {
        DataError::Io {
            path: dest.to_path_buf(),
            message: err.to_string(),
        }
    } else {
        DataError::Encoding {
            path: dest.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Flush, retrying once on a transient interruption.
fn flush_with_retry<W: Write>(mut writer: W, dest: &Path) -> Result<()> {
    if let Err(first) = writer.flush() {
        if first.kind() != std::io::ErrorKind::Interrupted {
            return Err(DataError::Io {
                path: dest.to_path_buf(),
                message: first.to_string(),
            });
        }
        warn!(dest = %dest.display(), "flush interrupted, retrying");
        writer.flush().map_err(|e| DataError::Io {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::config::DataConfig;
    use crate::test_util::write_fixture;
    use std::fs::File;
    use std::sync::Arc;

    fn request(source: &Path, dest: &Path, format: ExportFormat) -> ExportRequest {
        ExportRequest {
            source_path: source.to_path_buf(),
            export_path: dest.to_path_buf(),
            format,
            filter: None,
            offset: None,
            limit: None,
        }
    }

    async fn lease_for(path: &Path) -> (Arc<FileCache>, ReaderLease) {
        let cache = Arc::new(FileCache::new(DataConfig::default()));
        let lease = cache.acquire(path).await.unwrap();
        (cache, lease)
    }

    #[tokio::test]
    async fn unwritable_destination_is_an_io_error_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s.parquet");
        write_fixture(&source, 10);
        let (_cache, lease) = lease_for(&source).await;

        let dest = dir.path().join("no-such-dir").join("out.csv");
        let err = export(
            &lease,
            &request(&source, &dest, ExportFormat::Csv),
            &DataConfig::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "IoError");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn empty_json_export_is_a_valid_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s.parquet");
        write_fixture(&source, 10);
        let (_cache, lease) = lease_for(&source).await;

        let dest = dir.path().join("out.json");
        let mut req = request(&source, &dest, ExportFormat::Json);
        req.filter = Some("qty < 0".into());
        let summary = export(&lease, &req, &DataConfig::default()).await.unwrap();
        assert_eq!(summary.rows_exported, 0);

        let parsed: Vec<Map<String, Value>> =
            serde_json::from_reader(File::open(&dest).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn offset_and_limit_bound_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s.parquet");
        write_fixture(&source, 50);
        let (_cache, lease) = lease_for(&source).await;

        let dest = dir.path().join("window.json");
        let mut req = request(&source, &dest, ExportFormat::Json);
        req.offset = Some(45);
        req.limit = Some(20);
        let summary = export(&lease, &req, &DataConfig::default()).await.unwrap();
        // Only five rows remain past the offset.
        assert_eq!(summary.rows_exported, 5);

        let parsed: Vec<Map<String, Value>> =
            serde_json::from_reader(File::open(&dest).unwrap()).unwrap();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed[0]["id"], serde_json::json!(45));
    }

    #[tokio::test]
    async fn csv_escapes_delimiters_quotes_and_newlines() {
        use arrow::array::{Int64Array, StringArray};
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tricky.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("text", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
                Arc::new(StringArray::from(vec![
                    Some("plain"),
                    Some("comma, inside"),
                    Some("has \"quotes\" and\nnewline"),
                    None,
                ])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&source).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let (_cache, lease) = lease_for(&source).await;
        let dest = dir.path().join("tricky.csv");
        export(
            &lease,
            &request(&source, &dest, ExportFormat::Csv),
            &DataConfig::default(),
        )
        .await
        .unwrap();

        let raw = std::fs::read(&dest).unwrap();
        assert_eq!(&raw[..3], &BOM[..]);
        let mut reader = csv::Reader::from_reader(&raw[3..]);
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            ["id", "text"]
        );
        let records: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(&records[1][1], "comma, inside");
        assert_eq!(&records[2][1], "has \"quotes\" and\nnewline");
        // NULL exports as the empty field.
        assert_eq!(&records[3][1], "");
    }
}
