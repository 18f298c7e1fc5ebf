//! Pipeline orchestration for ETL operations

use super::{Extractor, Loader, Transformer};
use crate::batch::RecordBatch;
use eyre::{Result, WrapErr};

/// Counters collected over a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSummary {
    pub batches_read: usize,
    pub batches_loaded: usize,
    pub batches_skipped: usize,
    pub rows_loaded: usize,
}

/// ETL Pipeline that drives Extract, Transform, and Load one batch at a time
///
/// Batches are processed strictly in source order: a batch is read,
/// transformed, and (unless it came out empty) loaded before the next one
/// is read. The first error from any stage ends the run.
///
/// # Type Parameters
/// - `E`: Extractor yielding record batches
/// - `T`: Transformer cleaning each batch
/// - `L`: Loader writing each non-empty batch
///
/// # Example
/// ```no_run
/// use csv2snow::etl::{Passthrough, Pipeline};
/// use csv2snow::source::CsvExtractor;
/// # use csv2snow::batch::RecordBatch;
/// # use csv2snow::etl::{LoadReport, Loader};
/// # struct PrintLoader;
/// # impl Loader for PrintLoader {
/// #     type Item = RecordBatch;
/// #     async fn load(&self, batch: RecordBatch) -> eyre::Result<LoadReport> {
/// #         Ok(LoadReport { success: true, chunks: 1, rows: batch.num_rows() })
/// #     }
/// # }
///
/// # async fn example() -> eyre::Result<()> {
/// let mut pipeline = Pipeline::new(
///     CsvExtractor::open("data.csv", Some(1000))?,
///     Passthrough,
///     PrintLoader,
/// );
///
/// let summary = pipeline.run().await?;
/// println!("Loaded {} rows", summary.rows_loaded);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor<Item = RecordBatch>,
    T: Transformer<Input = RecordBatch, Output = RecordBatch>,
    L: Loader<Item = RecordBatch>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the pipeline until the extractor is exhausted
    ///
    /// Returns counters for the run
    ///
    /// # Errors
    /// Returns the first extract, transform or load error encountered
    pub async fn run(&mut self) -> Result<JobSummary> {
        log::info!("Starting ETL pipeline");
        let mut summary = JobSummary::default();

        while let Some(batch) = self.extractor.extract().await? {
            summary.batches_read += 1;
            let number = summary.batches_read;
            log::debug!(
                "Batch {}: extracted {} rows x {} columns",
                number,
                batch.num_rows(),
                batch.num_columns()
            );

            let cleaned = self
                .transformer
                .transform(batch)
                .wrap_err_with(|| format!("Failed to transform batch {}", number))?;

            if cleaned.is_empty() {
                log::warn!("Transformed batch {} is empty; skipping load", number);
                summary.batches_skipped += 1;
                continue;
            }

            let report = self.loader.load(cleaned).await?;
            log::debug!("Batch {}: {}", number, report);
            summary.batches_loaded += 1;
            summary.rows_loaded += report.rows;
        }

        log::info!(
            "Pipeline finished: {} batch(es) read, {} loaded, {} skipped, {} row(s) loaded",
            summary.batches_read,
            summary.batches_loaded,
            summary.batches_skipped,
            summary.rows_loaded
        );
        Ok(summary)
    }
}
