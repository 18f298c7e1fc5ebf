//! Snowflake bulk loader
//!
//! Writes a record batch into an existing table with array-bound INSERT
//! statements, opening a fresh session for every load.

use super::session::{Binding, Session, SnowflakeClient};
use crate::batch::{DataType, RecordBatch};
use crate::config::ConnectionParameters;
use crate::error::EtlError;
use crate::etl::{LoadReport, Loader};

use eyre::{Result, WrapErr};

/// Quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Uppercase a possibly qualified table name and quote each part
///
/// `analytics.public.orders` becomes `"ANALYTICS"."PUBLIC"."ORDERS"`.
pub fn table_identifier(table_name: &str) -> String {
    table_name
        .to_uppercase()
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

fn binding_kind(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Integer => "FIXED",
        DataType::Float => "REAL",
        DataType::String | DataType::Null => "TEXT",
    }
}

/// `INSERT INTO <table> (<columns>) VALUES (?, ...)` for a batch's columns
pub fn insert_statement(table_name: &str, batch: &RecordBatch) -> String {
    let columns = batch
        .column_names()
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; batch.num_columns()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_identifier(table_name),
        columns,
        placeholders
    )
}

/// Column bindings for rows `start..end`
fn chunk_bindings(batch: &RecordBatch, start: usize, end: usize) -> Vec<Binding> {
    batch
        .columns()
        .iter()
        .map(|column| Binding {
            kind: binding_kind(column.data_type()),
            values: column.values()[start..end]
                .iter()
                .map(|v| v.to_text())
                .collect(),
        })
        .collect()
}

/// Insert every row of `batch` into `table_name` over an open session
///
/// Rows are split into chunks of `chunk_size` (all rows in one chunk when
/// `None`), one statement per chunk. `success` is true when the warehouse
/// reports exactly as many inserted rows as the batch holds; a chunk with no
/// reported count contributes no rows.
pub async fn bulk_insert(
    session: &Session,
    batch: &RecordBatch,
    table_name: &str,
    chunk_size: Option<usize>,
) -> Result<LoadReport> {
    let sql = insert_statement(table_name, batch);
    let total = batch.num_rows();
    let size = chunk_size.filter(|n| *n > 0).unwrap_or(total.max(1));

    let mut report = LoadReport::default();
    for (index, start) in (0..total).step_by(size).enumerate() {
        let end = (start + size).min(total);
        let bindings = chunk_bindings(batch, start, end);
        let result = session
            .execute(&sql, &bindings)
            .await
            .wrap_err_with(|| {
                format!(
                    "Failed to insert chunk {} (rows {}..{})",
                    index + 1,
                    start,
                    end
                )
            })?;

        // Rows count as loaded only once the warehouse confirms them
        let inserted = match result.rows_affected {
            Some(rows) => rows as usize,
            None => {
                log::warn!(
                    "Chunk {} reported no inserted row count (query {})",
                    index + 1,
                    result.query_id.as_deref().unwrap_or("unknown")
                );
                0
            }
        };
        log::debug!(
            "Chunk {}: inserted {} row(s) (query {})",
            index + 1,
            inserted,
            result.query_id.as_deref().unwrap_or("unknown")
        );
        report.chunks += 1;
        report.rows += inserted;
    }

    report.success = report.rows == total;
    Ok(report)
}

/// Loader writing record batches to a Snowflake table
///
/// Each call to [`Loader::load`] opens one session, inserts the batch, and
/// closes the session again whether or not the insert succeeded.
///
/// # Example
/// ```no_run
/// use csv2snow::client::SnowflakeLoader;
/// use csv2snow::config::ConnectionParameters;
///
/// # fn example() -> eyre::Result<()> {
/// let params = ConnectionParameters::new("loader", "secret", "xy12345.us-east-1");
/// let loader = SnowflakeLoader::try_new(params, "orders")?.with_chunk_size(Some(5000));
/// # Ok(())
/// # }
/// ```
pub struct SnowflakeLoader {
    client: SnowflakeClient,
    params: ConnectionParameters,
    table_name: String,
    chunk_size: Option<usize>,
}

impl SnowflakeLoader {
    pub fn try_new(params: ConnectionParameters, table_name: impl Into<String>) -> Result<Self> {
        let client = SnowflakeClient::try_new(&params)?;
        Ok(Self {
            client,
            params,
            table_name: table_name.into(),
            chunk_size: None,
        })
    }

    /// Set the number of rows per INSERT statement (default: whole batch)
    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn load_batch(&self, batch: &RecordBatch) -> Result<LoadReport> {
        let session = self.client.connect(&self.params).await?;

        let result = bulk_insert(&session, batch, &self.table_name, self.chunk_size).await;

        // Close on every path; a close failure never masks the insert result
        if let Err(e) = session.close().await {
            log::warn!("Failed to close Snowflake session: {}", e);
        }

        result
    }
}

impl Loader for SnowflakeLoader {
    type Item = RecordBatch;

    async fn load(&self, batch: Self::Item) -> Result<LoadReport> {
        log::info!(
            "Loading {} rows into Snowflake table {}",
            batch.num_rows(),
            self.table_name.to_uppercase()
        );

        match self.load_batch(&batch).await {
            Ok(report) => {
                log::info!(
                    "Bulk insert success={}, chunks={}, rows={}",
                    report.success,
                    report.chunks,
                    report.rows
                );
                Ok(report)
            }
            Err(e) => {
                log::error!("Error loading to Snowflake: {:#}", e);
                match e.downcast_ref::<EtlError>() {
                    Some(_) => Err(e),
                    None => Err(e.wrap_err(EtlError::load("bulk insert failed"))),
                }
            }
        }
    }
}
