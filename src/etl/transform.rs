//! Transformer trait for reshaping batches between extract and load

use crate::batch::RecordBatch;
use eyre::Result;

/// Transformer trait applied to every extracted item
///
/// Implementors define how to transform items, e.g. dropping or filling
/// missing values before a batch is loaded. Transformers must be pure: the
/// same input always yields the same output.
///
/// # Example
/// ```
/// use csv2snow::etl::Transformer;
/// use eyre::Result;
///
/// struct Trim;
///
/// impl Transformer for Trim {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.trim().to_string())
///     }
/// }
///
/// assert_eq!(Trim.transform("  a ".to_string()).unwrap(), "a");
/// ```
pub trait Transformer: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// # Errors
    /// Returns an error if the item cannot be transformed
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Hands record batches to the loader untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transformer for Passthrough {
    type Input = RecordBatch;
    type Output = RecordBatch;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}
