//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the trait definitions the job is assembled from,
//! plus the [`Pipeline`] that drives them one batch at a time.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::{LoadReport, Loader};
pub use pipeline::{JobSummary, Pipeline};
pub use transform::{Passthrough, Transformer};
