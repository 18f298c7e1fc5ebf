//! Loader trait for writing batches to a destination

use eyre::Result;

/// Outcome of a single bulk load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Whether the destination accepted every row
    pub success: bool,
    /// Number of chunks the rows were split into
    pub chunks: usize,
    /// Number of rows written
    pub rows: usize,
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "success={}, chunks={}, rows={}",
            self.success, self.chunks, self.rows
        )
    }
}

/// Loader trait for loading a batch to a destination
///
/// # Example
/// ```no_run
/// use csv2snow::etl::{LoadReport, Loader};
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     type Item = Vec<String>;
///
///     async fn load(&self, rows: Self::Item) -> Result<LoadReport> {
///         Ok(LoadReport { success: true, chunks: 1, rows: rows.len() })
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of batch to load
    type Item: Send;

    /// Load one batch to the destination
    ///
    /// # Errors
    /// Returns an error if connecting or writing fails
    fn load(&self, batch: Self::Item) -> impl std::future::Future<Output = Result<LoadReport>> + Send;
}
