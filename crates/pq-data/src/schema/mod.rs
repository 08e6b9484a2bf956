//! Footer-only schema and metadata extraction
//!
//! Reads row count and per-column type information without touching row
//! data, so it is cheap enough to call on every tab activation.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use parquet::basic::{ConvertedType, LogicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use tracing::debug;

use pq_core::{ColumnInfo, DataError, FileMetadata, Result};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Extract [`FileMetadata`] from a parquet footer. Idempotent.
pub fn read_metadata(path: &Path) -> Result<FileMetadata> {
    let mut file = File::open(path).map_err(|e| DataError::io(path, e))?;

    // Reject non-parquet input before handing it to the footer parser, so
    // a text file renamed to .parquet is NotAParquetFile, not Corrupt.
    let mut magic = [0u8; 4];
    let magic_ok = file.read_exact(&mut magic).is_ok() && &magic == PARQUET_MAGIC;
    if !magic_ok {
        return Err(DataError::NotAParquetFile {
            path: path.to_path_buf(),
            message: "missing PAR1 magic number".into(),
        });
    }

    let reader = SerializedFileReader::new(
        File::open(path).map_err(|e| DataError::io(path, e))?,
    )
    .map_err(|e| DataError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let file_meta = reader.metadata().file_metadata();
    let columns: Vec<ColumnInfo> = file_meta
        .schema()
        .get_fields()
        .iter()
        .map(|field| {
            let physical_type = format!("{:?}", field.get_physical_type());
            let info = field.get_basic_info();
            let logical_type = match info.logical_type() {
                Some(logical) => Some(logical_type_name(&logical)),
                None => converted_type_name(info.converted_type()),
            };
            ColumnInfo {
                name: field.name().to_string(),
                column_type: logical_type.clone().unwrap_or_else(|| physical_type.clone()),
                logical_type,
                physical_type,
            }
        })
        .collect();

    debug!(path = %path.display(), rows = file_meta.num_rows(), columns = columns.len(), "read parquet footer");

    Ok(FileMetadata {
        path: path.to_path_buf(),
        num_rows: file_meta.num_rows(),
        num_columns: columns.len(),
        columns,
    })
}

fn logical_type_name(logical: &LogicalType) -> String {
    match logical {
        LogicalType::String => "STRING".to_string(),
        LogicalType::Map => "MAP".to_string(),
        LogicalType::List => "LIST".to_string(),
        LogicalType::Enum => "ENUM".to_string(),
        LogicalType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        LogicalType::Date => "DATE".to_string(),
        LogicalType::Time {
            is_adjusted_to_u_t_c,
            unit,
        } => format!("TIME({:?}, UTC:{})", unit, is_adjusted_to_u_t_c),
        LogicalType::Timestamp {
            is_adjusted_to_u_t_c,
            unit,
        } => format!("TIMESTAMP({:?}, UTC:{})", unit, is_adjusted_to_u_t_c),
        LogicalType::Integer {
            bit_width,
            is_signed,
        } => format!("INT{}{}", bit_width, if *is_signed { "" } else { "_UNSIGNED" }),
        LogicalType::Unknown => "UNKNOWN".to_string(),
        LogicalType::Json => "JSON".to_string(),
        LogicalType::Bson => "BSON".to_string(),
        LogicalType::Uuid => "UUID".to_string(),
        LogicalType::Float16 => "FLOAT16".to_string(),
    }
}

/// Legacy files carry converted types instead of logical annotations.
fn converted_type_name(converted: ConvertedType) -> Option<String> {
    let name = match converted {
        ConvertedType::NONE => return None,
        ConvertedType::UTF8 => "STRING".to_string(),
        ConvertedType::MAP => "MAP".to_string(),
        ConvertedType::MAP_KEY_VALUE => "MAP_KEY_VALUE".to_string(),
        ConvertedType::LIST => "LIST".to_string(),
        ConvertedType::ENUM => "ENUM".to_string(),
        ConvertedType::DECIMAL => "DECIMAL".to_string(),
        ConvertedType::DATE => "DATE".to_string(),
        ConvertedType::TIME_MILLIS => "TIME_MILLIS".to_string(),
        ConvertedType::TIME_MICROS => "TIME_MICROS".to_string(),
        ConvertedType::TIMESTAMP_MILLIS => "TIMESTAMP_MILLIS".to_string(),
        ConvertedType::TIMESTAMP_MICROS => "TIMESTAMP_MICROS".to_string(),
        ConvertedType::UINT_8 => "UINT8".to_string(),
        ConvertedType::UINT_16 => "UINT16".to_string(),
        ConvertedType::UINT_32 => "UINT32".to_string(),
        ConvertedType::UINT_64 => "UINT64".to_string(),
        ConvertedType::INT_8 => "INT8".to_string(),
        ConvertedType::INT_16 => "INT16".to_string(),
        ConvertedType::INT_32 => "INT32".to_string(),
        ConvertedType::INT_64 => "INT64".to_string(),
        ConvertedType::JSON => "JSON".to_string(),
        ConvertedType::BSON => "BSON".to_string(),
        ConvertedType::INTERVAL => "INTERVAL".to_string(),
    };
    Some(name)
}
