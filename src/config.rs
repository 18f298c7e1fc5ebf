//! Job configuration
//!
//! Loaded once at startup from a YAML file, then overridden by environment
//! variables for the Snowflake credentials. Example:
//!
//! ```yaml
//! csv_path: data/orders.csv
//! table_name: orders
//! chunk_size: 10000
//! transform:
//!   drop_missing: false
//!   fill_missing_value: 0
//! snowflake:
//!   user: loader
//!   password: hunter2
//!   account: xy12345.us-east-1
//!   warehouse: COMPUTE_WH
//!   database: ANALYTICS
//!   schema: PUBLIC
//! ```

use crate::error::EtlError;
use crate::transform::TransformPolicy;

use eyre::Result;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub const ENV_USER: &str = "SNOWFLAKE_USER";
pub const ENV_PASSWORD: &str = "SNOWFLAKE_PASSWORD";
pub const ENV_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";

/// `table`, `schema.table` or `db.schema.table`; parts are quoted on load,
/// so anything but an empty part or a control character is accepted
static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^.\p{Cc}]+(\.[^.\p{Cc}]+){0,2}$").expect("table name pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    csv_path: Option<PathBuf>,
    table_name: Option<String>,
    chunk_size: Option<usize>,
    transform: Option<TransformPolicy>,
    snowflake: Option<RawSnowflake>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSnowflake {
    user: Option<String>,
    password: Option<String>,
    account: Option<String>,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
    host: Option<String>,
    insert_chunk_size: Option<usize>,
}

/// Everything needed to open a Snowflake session
#[derive(Clone, PartialEq)]
pub struct ConnectionParameters {
    pub user: String,
    pub password: String,
    /// Account identifier, e.g. `xy12345.us-east-1`
    pub account: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    /// Endpoint override; defaults to `https://{account}.snowflakecomputing.com`
    pub host: Option<Url>,
}

impl ConnectionParameters {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            account: account.into(),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            host: None,
        }
    }

    /// Point the connection at a specific endpoint
    pub fn with_host(mut self, host: Url) -> Self {
        self.host = Some(host);
        self
    }

    /// Base URL of the account's endpoint
    pub fn base_url(&self) -> Result<Url> {
        match &self.host {
            Some(host) => Ok(host.clone()),
            None => {
                let url = format!("https://{}.snowflakecomputing.com", self.account);
                Url::parse(&url)
                    .map_err(|e| EtlError::config(format!("Invalid account '{}': {}", self.account, e)).into())
            }
        }
    }

    /// Account name without region or cloud suffix
    pub fn account_name(&self) -> &str {
        self.account.split('.').next().unwrap_or(&self.account)
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("user", &self.user)
            .field("password", &"********")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host.as_ref().map(Url::as_str))
            .finish()
    }
}

/// Immutable configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub csv_path: PathBuf,
    pub table_name: String,
    /// Rows per extracted batch; `None` reads the whole file at once
    pub chunk_size: Option<usize>,
    pub transform: TransformPolicy,
    pub connection: ConnectionParameters,
    /// Rows per INSERT statement; `None` inserts a batch in one statement
    pub insert_chunk_size: Option<usize>,
}

impl JobConfig {
    /// Load a config file and apply environment overrides from the process
    ///
    /// # Errors
    /// Returns [`EtlError::Config`] if the file is missing or invalid, or a
    /// required field is absent after overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading config from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!("Failed to load config file {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&content, |key| std::env::var(key).ok()).map_err(|e| match e
            .downcast::<EtlError>()
        {
            Ok(EtlError::Config(message)) => {
                EtlError::config(format!("{} ({})", message, path.display())).into()
            }
            Ok(other) => other.into(),
            Err(report) => report,
        })
    }

    /// Parse YAML content, reading overrides through `env`
    ///
    /// Empty environment values are ignored.
    pub fn from_yaml(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str::<Option<RawConfig>>(content)
            .map_err(|e| EtlError::config(format!("Invalid config file: {}", e)))?
            .unwrap_or_default();

        let (csv_path, table_name) = match (raw.csv_path, raw.table_name) {
            (Some(csv), Some(table)) if !csv.as_os_str().is_empty() && !table.is_empty() => {
                (csv, table)
            }
            _ => {
                return Err(EtlError::config(
                    "Both 'csv_path' and 'table_name' must be defined in the config file",
                )
                .into());
            }
        };

        if !TABLE_NAME.is_match(&table_name) {
            return Err(EtlError::config(format!("Invalid table_name '{}'", table_name)).into());
        }
        if raw.chunk_size == Some(0) {
            return Err(EtlError::config("chunk_size must be a positive integer").into());
        }

        let sf = raw.snowflake.unwrap_or_default();
        if sf.insert_chunk_size == Some(0) {
            return Err(
                EtlError::config("snowflake.insert_chunk_size must be a positive integer").into(),
            );
        }

        let env_or = |key: &str, value: Option<String>| {
            env(key).filter(|v| !v.is_empty()).or(value)
        };
        let user = env_or(ENV_USER, sf.user);
        let password = env_or(ENV_PASSWORD, sf.password);
        let account = env_or(ENV_ACCOUNT, sf.account);

        let required = |name: &str, env_key: &str, value: Option<String>| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                EtlError::config(format!(
                    "Missing snowflake.{} (set it in the config file or {})",
                    name, env_key
                ))
            })
        };
        let user = required("user", ENV_USER, user)?;
        let password = required("password", ENV_PASSWORD, password)?;
        let account = required("account", ENV_ACCOUNT, account)?;

        let host = sf
            .host
            .map(|h| {
                Url::parse(&h)
                    .map_err(|e| EtlError::config(format!("Invalid snowflake.host '{}': {}", h, e)))
            })
            .transpose()?;

        Ok(Self {
            csv_path,
            table_name,
            chunk_size: raw.chunk_size,
            transform: raw.transform.unwrap_or_default(),
            connection: ConnectionParameters {
                user,
                password,
                account,
                warehouse: sf.warehouse,
                database: sf.database,
                schema: sf.schema,
                role: sf.role,
                host,
            },
            insert_chunk_size: sf.insert_chunk_size,
        })
    }
}
