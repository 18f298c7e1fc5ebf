//! Source readers producing record batches
//!
//! - [`CsvExtractor`]: delimited files with a header row
//! - [`inference`]: null markers and per-column type inference

mod csv_reader;
pub mod inference;

pub use csv_reader::CsvExtractor;
