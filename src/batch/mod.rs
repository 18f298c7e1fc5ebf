//! In-memory record batches moved through the pipeline

mod record_batch;
mod value;

pub use record_batch::{Column, RecordBatch};
pub use value::{DataType, Value};
