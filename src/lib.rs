//! csv2snow
//!
//! A batch ETL job that extracts a CSV file, cleans missing values, and
//! bulk-loads the result into a Snowflake table.

pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod etl;
pub mod source;
pub mod transform;

// Re-exports for convenience
pub use batch::{Column, DataType, RecordBatch, Value};
pub use client::{SnowflakeClient, SnowflakeLoader};
pub use config::{ConnectionParameters, JobConfig};
pub use error::EtlError;
pub use etl::{Extractor, JobSummary, LoadReport, Loader, Pipeline, Transformer};
pub use source::CsvExtractor;
pub use transform::{NullHandler, TransformPolicy};
