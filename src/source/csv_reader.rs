//! CSV file extractor
//!
//! Reads a delimited file with a header row and yields [`RecordBatch`]es of
//! at most `batch_size` rows, or the whole file as one batch.

use super::inference::{dedupe_headers, infer_column};
use crate::batch::{Column, DataType, RecordBatch};
use crate::error::EtlError;
use crate::etl::Extractor;

use eyre::Result;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Extractor over a CSV file
///
/// Column types are inferred independently for every batch. Rows with fewer
/// fields than the header are padded with nulls; rows with more fields are a
/// parse error.
///
/// # Example
/// ```no_run
/// use csv2snow::etl::Extractor;
/// use csv2snow::source::CsvExtractor;
///
/// # async fn example() -> eyre::Result<()> {
/// let mut extractor = CsvExtractor::open("data/orders.csv", Some(10_000))?;
/// while let Some(batch) = extractor.extract().await? {
///     println!("{} rows", batch.num_rows());
/// }
/// # Ok(())
/// # }
/// ```
pub struct CsvExtractor {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
    batch_size: Option<usize>,
    batches_emitted: usize,
    exhausted: bool,
}

impl CsvExtractor {
    /// Open a CSV file and read its header row
    ///
    /// # Errors
    /// - [`EtlError::SourceNotFound`] if the file does not exist
    /// - [`EtlError::Parse`] if the header cannot be read or the file is empty
    pub fn open(path: impl AsRef<Path>, batch_size: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::info!(
            "Extracting CSV from {} (chunksize={})",
            path.display(),
            batch_size.map_or("none".to_string(), |n| n.to_string())
        );

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!("CSV file not found: {}", path.display());
                return Err(EtlError::SourceNotFound(path).into());
            }
            Err(e) => return Err(EtlError::parse(&path, e.to_string()).into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| EtlError::parse(&path, e.to_string()))?;
        if headers.is_empty() {
            return Err(EtlError::parse(&path, "No columns to parse from file").into());
        }
        let headers = dedupe_headers(headers.iter());
        log::debug!("CSV columns: {}", headers.join(", "));

        Ok(Self {
            path,
            reader,
            headers,
            batch_size: batch_size.filter(|n| *n > 0),
            batches_emitted: 0,
            exhausted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names after de-duplication
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Read up to `batch_size` records (all remaining when unbounded)
    fn read_records(&mut self) -> Result<Vec<csv::StringRecord>> {
        let limit = self.batch_size.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        let mut record = csv::StringRecord::new();

        while records.len() < limit {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|e| EtlError::parse(&self.path, e.to_string()))?;
            if !more {
                self.exhausted = true;
                break;
            }
            if record.len() > self.headers.len() {
                let line = record.position().map_or(0, |p| p.line());
                return Err(EtlError::parse(
                    &self.path,
                    format!(
                        "Expected {} fields in line {}, saw {}",
                        self.headers.len(),
                        line,
                        record.len()
                    ),
                )
                .into());
            }
            records.push(record.clone());
        }

        Ok(records)
    }

    fn build_batch(&self, records: &[csv::StringRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            let schema: Vec<(String, DataType)> = self
                .headers
                .iter()
                .map(|h| (h.clone(), DataType::Null))
                .collect();
            return Ok(RecordBatch::empty(&schema));
        }

        let columns: Vec<Column> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let fields: Vec<Option<&str>> = records.iter().map(|r| r.get(i)).collect();
                infer_column(name, &fields)
            })
            .collect();

        RecordBatch::try_new(columns)
    }
}

impl Extractor for CsvExtractor {
    type Item = RecordBatch;

    async fn extract(&mut self) -> Result<Option<Self::Item>> {
        if self.exhausted {
            return Ok(None);
        }

        let records = self.read_records()?;
        // A header-only file still yields one (empty) batch
        if records.is_empty() && self.batches_emitted > 0 {
            return Ok(None);
        }

        let batch = self.build_batch(&records)?;
        self.batches_emitted += 1;
        log::debug!(
            "Read batch {} from {} ({} rows)",
            self.batches_emitted,
            self.path.display(),
            batch.num_rows()
        );
        Ok(Some(batch))
    }
}
