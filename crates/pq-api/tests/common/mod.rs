//! Fixture helpers shared by the service tests

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{BooleanArray, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

pub const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Write a 5-column fixture (id, name, qty, price, active) with `name`
/// NULL on every tenth row and small row groups.
pub fn write_fixture(path: &Path, rows: usize) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("qty", DataType::Int32, false),
        Field::new("price", DataType::Float64, false),
        Field::new("active", DataType::Boolean, false),
    ]));

    let id = Int64Array::from_iter_values(0..rows as i64);
    let name = StringArray::from_iter((0..rows).map(|i| {
        if i % 10 == 9 {
            None
        } else {
            Some(NAMES[i % 4])
        }
    }));
    let qty = Int32Array::from_iter_values((0..rows).map(|i| (i % 100) as i32));
    let price = Float64Array::from_iter_values((0..rows).map(|i| i as f64 * 1.5));
    let active = BooleanArray::from_iter((0..rows).map(|i| Some(i % 2 == 0)));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(id),
            Arc::new(name),
            Arc::new(qty),
            Arc::new(price),
            Arc::new(active),
        ],
    )
    .unwrap();

    let props = WriterProperties::builder()
        .set_max_row_group_size(64)
        .build();
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// Rows whose non-null `name` equals `name`.
pub fn name_count(rows: usize, name: &str) -> usize {
    (0..rows)
        .filter(|i| i % 10 != 9 && NAMES[i % 4] == name)
        .count()
}
