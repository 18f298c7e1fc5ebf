//! CLI helper functions
//!
//! Wires the CSV extractor, null handler and Snowflake loader together for
//! one run of the job.

use crate::{
    client::SnowflakeLoader,
    config::JobConfig,
    etl::{JobSummary, Pipeline},
    source::CsvExtractor,
    transform::NullHandler,
};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::Path;

/// Load the config file and run the job it describes
///
/// Pipeline: CsvExtractor → NullHandler → SnowflakeLoader
pub async fn run(config_path: impl AsRef<Path>) -> Result<JobSummary> {
    let config_path = config_path.as_ref();
    log::info!("Loading config from {}", config_path.display().bright_black());
    let config = JobConfig::load(config_path)?;
    run_job(&config).await
}

/// Run one extract → transform → load pass over `config.csv_path`
///
/// The source is opened before anything touches the warehouse, so a missing
/// file fails the run without a connection attempt.
pub async fn run_job(config: &JobConfig) -> Result<JobSummary> {
    log::info!(
        "Loading {} into table {}",
        config.csv_path.display().bright_black(),
        config.table_name.to_uppercase().cyan()
    );
    log::debug!("Connection: {:?}", config.connection);

    let extractor = CsvExtractor::open(&config.csv_path, config.chunk_size)?;
    let transformer = NullHandler::new(config.transform.clone());
    let loader = SnowflakeLoader::try_new(config.connection.clone(), &config.table_name)?
        .with_chunk_size(config.insert_chunk_size);

    let summary = Pipeline::new(extractor, transformer, loader).run().await?;

    log::info!("✓ ETL pipeline completed successfully");
    Ok(summary)
}
