//! Extractor trait for pulling record batches from a source

use eyre::Result;

/// Extractor trait for reading a source as a lazy sequence of batches
///
/// Each call to [`Extractor::extract`] yields the next batch in source order,
/// and `Ok(None)` once the source is exhausted. Extractors are finite and
/// cannot be restarted.
///
/// # Example
/// ```no_run
/// use csv2snow::etl::Extractor;
/// use eyre::Result;
///
/// struct Countdown {
///     remaining: u32,
/// }
///
/// impl Extractor for Countdown {
///     type Item = u32;
///
///     async fn extract(&mut self) -> Result<Option<Self::Item>> {
///         if self.remaining == 0 {
///             return Ok(None);
///         }
///         self.remaining -= 1;
///         Ok(Some(self.remaining))
///     }
/// }
/// ```
pub trait Extractor: Send {
    /// The type of batch extracted
    type Item: Send;

    /// Extract the next batch from the source
    ///
    /// # Errors
    /// Returns an error if the source is missing or its content is malformed
    fn extract(&mut self) -> impl std::future::Future<Output = Result<Option<Self::Item>>> + Send;
}
