//! Snowflake client and bulk loader.
//!
//! This module provides the [`SnowflakeClient`] for opening sessions against
//! a Snowflake account, and the [`SnowflakeLoader`] that bulk-inserts record
//! batches into a table.

mod loader;
mod session;

pub use loader::{SnowflakeLoader, bulk_insert, insert_statement, quote_identifier, table_identifier};
pub use session::{Binding, QueryResult, Session, SnowflakeClient};
