//! Snowflake session over the connector REST endpoints
//!
//! A [`SnowflakeClient`] logs in with user/password to obtain a session
//! token, then runs statements with positional array bindings against
//! `/queries/v1/query-request`. Statements the server has not finished
//! within the request are polled through their result URL until they
//! complete. Sessions are closed with `POST /session?delete=true`.

use crate::config::ConnectionParameters;
use crate::error::EtlError;

use eyre::{Result, WrapErr};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response codes for a statement still executing on the server
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

const RESULT_POLL_INITIAL: Duration = Duration::from_millis(100);
const RESULT_POLL_MAX: Duration = Duration::from_secs(5);
const RESULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Envelope every connector endpoint responds with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    #[serde(default)]
    success: bool,
    message: Option<String>,
    code: Option<JsonValue>,
}

impl<T> ApiResponse<T> {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }

    /// Accepted, but the statement has not finished yet
    fn is_in_progress(&self) -> bool {
        self.success
            && self
                .code()
                .is_some_and(|code| QUERY_IN_PROGRESS_CODES.contains(&code.as_str()))
    }

    fn into_data(self, action: &str) -> Result<T> {
        if !self.success {
            let code = self.code().unwrap_or_else(|| "none".to_string());
            return Err(EtlError::load(format!(
                "{} failed (code {}): {}",
                action,
                code,
                self.message.unwrap_or_else(|| "no message".to_string())
            ))
            .into());
        }
        self.data
            .ok_or_else(|| EtlError::load(format!("{} returned no data", action)).into())
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryStats {
    #[serde(rename = "numRowsInserted")]
    num_rows_inserted: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(rename = "queryId")]
    query_id: Option<String>,
    #[serde(rename = "getResultUrl")]
    get_result_url: Option<String>,
    rowset: Option<Vec<Vec<JsonValue>>>,
    stats: Option<QueryStats>,
}

/// Result of a single statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub query_id: Option<String>,
    /// Rows affected; `None` when the statement reported no count
    pub rows_affected: Option<u64>,
}

impl From<QueryData> for QueryResult {
    fn from(data: QueryData) -> Self {
        // DML reports its count in the first cell of the rowset, as a string
        let from_rowset = data
            .rowset
            .as_ref()
            .and_then(|rows| rows.first())
            .and_then(|row| row.first())
            .and_then(|cell| match cell {
                JsonValue::String(s) => s.parse().ok(),
                JsonValue::Number(n) => n.as_u64(),
                _ => None,
            });
        let rows_affected = data
            .stats
            .and_then(|s| s.num_rows_inserted)
            .or(from_rowset);

        Self {
            query_id: data.query_id,
            rows_affected,
        }
    }
}

/// A positional parameter binding: one value per row
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Snowflake binding type: TEXT, FIXED, REAL or BOOLEAN
    pub kind: &'static str,
    pub values: Vec<Option<String>>,
}

/// HTTP client able to open sessions against one account
#[derive(Clone, Debug)]
pub struct SnowflakeClient {
    http: Client,
    base_url: Url,
}

impl SnowflakeClient {
    /// Build a client for the account described by `params`
    ///
    /// Idle connections are not kept between sessions.
    pub fn try_new(params: &ConnectionParameters) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse()?);
        let http = Client::builder()
            .default_headers(headers)
            .user_agent(format!("{}/{}", CLIENT_APP_ID, CLIENT_APP_VERSION))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            http,
            base_url: params.base_url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authenticate and open a new session
    ///
    /// # Errors
    /// Returns [`EtlError::Load`] if the endpoint is unreachable or rejects
    /// the credentials.
    pub async fn connect(&self, params: &ConnectionParameters) -> Result<Session> {
        log::debug!(
            "Connecting to Snowflake at {} as {}",
            self.base_url,
            params.user
        );

        let mut query = vec![("request_id", Uuid::new_v4().to_string())];
        let optional = [
            ("warehouse", &params.warehouse),
            ("databaseName", &params.database),
            ("schemaName", &params.schema),
            ("roleName", &params.role),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                query.push((key, value.clone()));
            }
        }

        let body = json!({
            "data": {
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": CLIENT_APP_VERSION,
                "ACCOUNT_NAME": params.account_name(),
                "LOGIN_NAME": params.user,
                "PASSWORD": params.password,
                "CLIENT_ENVIRONMENT": {
                    "APPLICATION": CLIENT_APP_ID,
                    "OS": std::env::consts::OS,
                },
            }
        });

        let url = self.endpoint("session/v1/login-request")?;
        let request = self.http.post(url).query(&query).json(&body);
        let login: LoginData = send(request, "Login").await?;

        log::debug!("Snowflake session opened");
        Ok(Session {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: login.token,
            sequence: AtomicU64::new(0),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| EtlError::load(format!("Invalid endpoint {}: {}", path, e)).into())
    }
}

/// An authenticated Snowflake session
///
/// Call [`Session::close`] when done; dropping a session leaves it to expire
/// on the server.
#[derive(Debug)]
pub struct Session {
    http: Client,
    base_url: Url,
    token: String,
    sequence: AtomicU64,
}

impl Session {
    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    /// Run one statement, binding `bindings` to its `?` placeholders in order
    pub async fn execute(&self, sql: &str, bindings: &[Binding]) -> Result<QueryResult> {
        let sequence_id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let submitted = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": sequence_id,
            "querySubmissionTime": submitted,
        });
        if !bindings.is_empty() {
            let bound: BTreeMap<String, JsonValue> = bindings
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    (
                        (i + 1).to_string(),
                        json!({ "type": b.kind, "value": b.values }),
                    )
                })
                .collect();
            body["bindings"] = json!(bound);
        }

        log::trace!("Executing statement {}: {}", sequence_id, sql);
        let url = self
            .base_url
            .join("queries/v1/query-request")
            .map_err(|e| EtlError::load(e.to_string()))?;
        let request = self
            .http
            .post(url)
            .query(&[("requestId", Uuid::new_v4().to_string())])
            .header(header::AUTHORIZATION, self.authorization())
            .json(&body);

        let envelope: ApiResponse<QueryData> = send_envelope(request, "Query").await?;
        let envelope = self.wait_for_result(envelope).await?;
        let data = envelope.into_data("Query")?;
        Ok(data.into())
    }

    /// Poll the result URL of a statement still running on the server
    async fn wait_for_result(
        &self,
        mut envelope: ApiResponse<QueryData>,
    ) -> Result<ApiResponse<QueryData>> {
        let started = Instant::now();
        let mut delay = RESULT_POLL_INITIAL;

        while envelope.is_in_progress() {
            let data = envelope.data.as_ref();
            let query_id = data
                .and_then(|d| d.query_id.clone())
                .unwrap_or_else(|| "unknown".to_string());
            let result_url = data
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    EtlError::load(format!(
                        "Query {} is still running but returned no result URL",
                        query_id
                    ))
                })?;
            if started.elapsed() >= RESULT_TIMEOUT {
                return Err(EtlError::load(format!(
                    "Query {} did not finish within {}s",
                    query_id,
                    RESULT_TIMEOUT.as_secs()
                ))
                .into());
            }

            log::debug!("Query {} still running; polling {}", query_id, result_url);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(RESULT_POLL_MAX);

            let url = self.base_url.join(&result_url).map_err(|e| {
                EtlError::load(format!("Invalid result URL {}: {}", result_url, e))
            })?;
            let request = self
                .http
                .get(url)
                .query(&[("requestId", Uuid::new_v4().to_string())])
                .header(header::AUTHORIZATION, self.authorization());
            envelope = send_envelope(request, "Query result").await?;
        }

        Ok(envelope)
    }

    /// Close the session on the server
    pub async fn close(self) -> Result<()> {
        let url = self
            .base_url
            .join("session")
            .map_err(|e| EtlError::load(e.to_string()))?;
        let request = self
            .http
            .post(url)
            .query(&[("delete", "true")])
            .header(header::AUTHORIZATION, self.authorization());

        let response = request
            .send()
            .await
            .map_err(|e| EtlError::load(format!("Failed to close session: {}", e)))?;
        if !response.status().is_success() {
            return Err(EtlError::load(format!(
                "Failed to close session ({})",
                response.status()
            ))
            .into());
        }
        log::debug!("Snowflake session closed");
        Ok(())
    }
}

/// Send a request and unwrap the response envelope
async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder, action: &str) -> Result<T> {
    send_envelope(request, action).await?.into_data(action)
}

/// Send a request and parse the response envelope without judging it
async fn send_envelope<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    action: &str,
) -> Result<ApiResponse<T>> {
    let response = request
        .send()
        .await
        .map_err(|e| EtlError::load(format!("{} request failed: {}", action, e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| EtlError::load(format!("{} response unreadable: {}", action, e)))?;

    if !status.is_success() {
        let hint = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => " (check credentials)",
            _ => "",
        };
        return Err(EtlError::load(format!(
            "{} failed with HTTP {}{}: {}",
            action, status, hint, text
        ))
        .into());
    }

    let envelope: ApiResponse<T> = serde_json::from_str(&text)
        .map_err(|e| EtlError::load(format!("{} response is not valid JSON: {}", action, e)))
        .wrap_err_with(|| format!("Unexpected {} response body", action.to_lowercase()))?;
    Ok(envelope)
}
