//! Conversion of record batches into JSON row objects
//!
//! Row objects map column name to value in schema order; NULL stays JSON
//! null end to end. `serde_json` runs with `preserve_order`, so the maps
//! keep the writer's key order.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};

use pq_core::{DataError, Result};

/// Convert batches to row objects via Arrow's line-delimited JSON writer.
///
/// Explicit nulls are forced on so every row object carries all columns.
pub fn batches_to_rows(batches: &[RecordBatch], path: &Path) -> Result<Vec<Map<String, Value>>> {
    let encoding = |e: arrow::error::ArrowError| DataError::Encoding {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut buf = Vec::new();
    {
        let mut writer = arrow::json::WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, arrow::json::writer::LineDelimited>(&mut buf);
        for batch in batches {
            writer.write(batch).map_err(encoding)?;
        }
        writer.finish().map_err(encoding)?;
    }

    serde_json::Deserializer::from_slice(&buf)
        .into_iter::<Map<String, Value>>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DataError::Encoding {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

pub fn batch_to_rows(batch: &RecordBatch, path: &Path) -> Result<Vec<Map<String, Value>>> {
    batches_to_rows(std::slice::from_ref(batch), path)
}

/// Render one JSON value as a CSV field. NULL becomes the empty field;
/// nested values fall back to their compact JSON form.
pub fn value_to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
