//! Transformers applied to record batches before load

mod null_handler;

pub use null_handler::{NullHandler, TransformPolicy};
