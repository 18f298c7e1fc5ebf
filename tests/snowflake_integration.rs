//! Integration tests for loading into Snowflake
//!
//! A wiremock server stands in for the account endpoint: it accepts logins,
//! answers INSERT statements with the number of bound rows, and records
//! session closes.

use csv2snow::batch::{Column, RecordBatch, Value};
use csv2snow::cli::{run, run_job};
use csv2snow::config::{ConnectionParameters, JobConfig};
use csv2snow::error::EtlError;
use csv2snow::etl::Loader;
use csv2snow::client::SnowflakeLoader;
use serde_json::{Value as JsonValue, json};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TOKEN: &str = "test-session-token";

/// Replies to an INSERT with a row count equal to the number of bound rows
struct InsertResponder;

impl Respond for InsertResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
        let rows = body["bindings"]["1"]["value"]
            .as_array()
            .map_or(0, |values| values.len());
        ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "queryId": "01b2c3d4-0000-0000-0000-000000000001",
                "rowtype": [{"name": "number of rows inserted"}],
                "rowset": [[rows.to_string()]]
            },
            "success": true,
            "message": null,
            "code": null
        }))
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": TOKEN, "masterToken": "master"},
            "success": true,
            "message": null,
            "code": null
        })))
        .mount(server)
        .await;
}

async fn mount_close(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(query_param("delete", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(expected)
        .mount(server)
        .await;
}

fn insert_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .and(header("authorization", format!("Snowflake Token=\"{}\"", TOKEN).as_str()))
}

async fn insert_requests(server: &MockServer) -> Vec<JsonValue> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/queries/v1/query-request")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn params(server: &MockServer) -> ConnectionParameters {
    ConnectionParameters::new("loader", "secret", "xy12345")
        .with_host(Url::parse(&server.uri()).unwrap())
}

fn batch(rows: i64) -> RecordBatch {
    RecordBatch::try_new(vec![
        Column::from_values("id", (1..=rows).map(Value::Integer).collect()),
        Column::from_values(
            "name",
            (1..=rows).map(|i| Value::from(format!("n{}", i))).collect(),
        ),
    ])
    .unwrap()
}

fn write_config(dir: &TempDir, csv_path: &std::path::Path, server: &MockServer, extra: &str) -> std::path::PathBuf {
    let config_path = dir.path().join("config.yaml");
    let yaml = format!(
        "csv_path: {}\ntable_name: orders\n{}snowflake:\n  user: loader\n  password: secret\n  account: xy12345\n  warehouse: COMPUTE_WH\n  database: ANALYTICS\n  schema: PUBLIC\n  host: {}\n",
        csv_path.display(),
        extra,
        server.uri()
    );
    std::fs::write(&config_path, yaml).unwrap();
    config_path
}

#[tokio::test]
#[serial_test::serial]
async fn test_five_rows_one_null_loads_four() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(InsertResponder)
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("orders.csv");
    std::fs::write(
        &csv_path,
        "id,name,amount\n1,a,1.5\n2,b,\n3,c,3.5\n4,d,4.0\n5,e,5.25\n",
    )
    .unwrap();
    let config_path = write_config(&dir, &csv_path, &server, "");

    unsafe {
        std::env::remove_var("SNOWFLAKE_USER");
        std::env::remove_var("SNOWFLAKE_PASSWORD");
        std::env::remove_var("SNOWFLAKE_ACCOUNT");
    }

    let summary = run(&config_path).await.unwrap();
    assert_eq!(summary.batches_loaded, 1);
    assert_eq!(summary.rows_loaded, 4);

    let inserts = insert_requests(&server).await;
    assert_eq!(inserts.len(), 1);
    let body = &inserts[0];
    assert_eq!(
        body["sqlText"],
        "INSERT INTO \"ORDERS\" (\"id\", \"name\", \"amount\") VALUES (?, ?, ?)"
    );
    assert_eq!(body["bindings"]["1"]["type"], "FIXED");
    assert_eq!(body["bindings"]["1"]["value"], json!(["1", "3", "4", "5"]));
    assert_eq!(body["bindings"]["3"]["type"], "REAL");
    assert_eq!(body["bindings"]["3"]["value"], json!(["1.5", "3.5", "4", "5.25"]));
}

#[tokio::test]
async fn test_loader_report() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(InsertResponder)
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let report = loader.load(batch(4)).await.unwrap();

    assert!(report.success);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.rows, 4);
}

#[tokio::test]
async fn test_login_sends_connection_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .and(query_param("warehouse", "COMPUTE_WH"))
        .and(query_param("databaseName", "ANALYTICS"))
        .and(query_param("schemaName", "PUBLIC"))
        .and(body_partial_json(json!({
            "data": {
                "LOGIN_NAME": "loader",
                "PASSWORD": "secret",
                "ACCOUNT_NAME": "xy12345"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": TOKEN},
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(InsertResponder)
        .mount(&server)
        .await;

    let mut params = params(&server);
    params.warehouse = Some("COMPUTE_WH".to_string());
    params.database = Some("ANALYTICS".to_string());
    params.schema = Some("PUBLIC".to_string());

    let loader = SnowflakeLoader::try_new(params, "orders").unwrap();
    loader.load(batch(1)).await.unwrap();
}

#[tokio::test]
async fn test_insert_chunks() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(InsertResponder)
        .expect(3)
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "analytics.public.orders")
        .unwrap()
        .with_chunk_size(Some(2));
    let report = loader.load(batch(5)).await.unwrap();

    assert!(report.success);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.rows, 5);

    let inserts = insert_requests(&server).await;
    let sizes: Vec<usize> = inserts
        .iter()
        .map(|b| b["bindings"]["1"]["value"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert!(
        inserts[0]["sqlText"]
            .as_str()
            .unwrap()
            .starts_with("INSERT INTO \"ANALYTICS\".\"PUBLIC\".\"ORDERS\"")
    );
}

#[tokio::test]
async fn test_short_insert_count_is_not_success() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"rowset": [["2"]]},
            "success": true
        })))
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let report = loader.load(batch(3)).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.rows, 2);
}

#[tokio::test]
async fn test_rejected_login_is_load_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "success": false,
            "message": "Incorrect username or password was specified.",
            "code": "390100"
        })))
        .mount(&server)
        .await;
    // No session was opened, so none is closed
    mount_close(&server, 0).await;
    insert_mock()
        .respond_with(InsertResponder)
        .expect(0)
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let err = loader.load(batch(1)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EtlError>(),
        Some(EtlError::Load(_))
    ));
    assert!(format!("{:#}", err).contains("Incorrect username"));
}

#[tokio::test]
async fn test_session_closed_when_insert_fails() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let err = loader.load(batch(2)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EtlError>(),
        Some(EtlError::Load(_))
    ));
    let message = format!("{:#}", err);
    assert!(message.contains("Failed to insert chunk 1"));
    assert!(message.contains("500"));
}

#[tokio::test]
async fn test_first_load_failure_aborts_run() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut csv = NamedTempFile::new().unwrap();
    write!(csv, "id\n1\n2\n3\n4\n").unwrap();

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, csv.path(), &server, "chunk_size: 2\n");
    let config = JobConfig::from_yaml(&std::fs::read_to_string(&config_path).unwrap(), |_| None)
        .unwrap();

    let err = run_job(&config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EtlError>(),
        Some(EtlError::Load(_))
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn test_env_credentials_reach_the_warehouse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .and(body_partial_json(json!({
            "data": {"LOGIN_NAME": "env_user", "PASSWORD": "env_secret"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": TOKEN},
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(InsertResponder)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("orders.csv");
    std::fs::write(&csv_path, "id\n1\n").unwrap();
    let config_path = write_config(&dir, &csv_path, &server, "");

    unsafe {
        std::env::set_var("SNOWFLAKE_USER", "env_user");
        std::env::set_var("SNOWFLAKE_PASSWORD", "env_secret");
        std::env::remove_var("SNOWFLAKE_ACCOUNT");
    }

    let result = run(&config_path).await;

    unsafe {
        std::env::remove_var("SNOWFLAKE_USER");
        std::env::remove_var("SNOWFLAKE_PASSWORD");
    }

    assert_eq!(result.unwrap().rows_loaded, 1);
}

#[tokio::test]
async fn test_running_insert_is_polled_until_done() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q1", "getResultUrl": "/queries/q1/result"},
            "success": true,
            "code": "333334"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries/q1/result"))
        .and(header("authorization", format!("Snowflake Token=\"{}\"", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q1", "rowset": [["4"]]},
            "success": true,
            "code": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let report = loader.load(batch(4)).await.unwrap();

    assert!(report.success);
    assert_eq!(report.rows, 4);
}

#[tokio::test]
async fn test_insert_without_row_count_is_not_success() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q2"},
            "success": true
        })))
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let report = loader.load(batch(4)).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.rows, 0);
}

#[tokio::test]
async fn test_running_insert_without_result_url_is_load_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_close(&server, 1).await;
    insert_mock()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q3"},
            "success": true,
            "code": "333333"
        })))
        .mount(&server)
        .await;

    let loader = SnowflakeLoader::try_new(params(&server), "orders").unwrap();
    let err = loader.load(batch(2)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EtlError>(),
        Some(EtlError::Load(_))
    ));
    assert!(format!("{:#}", err).contains("no result URL"));
}

#[tokio::test]
async fn test_missing_source_never_contacts_the_warehouse() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &dir.path().join("absent.csv"), &server, "");
    let config = JobConfig::from_yaml(&std::fs::read_to_string(&config_path).unwrap(), |_| None)
        .unwrap();

    let err = run_job(&config).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EtlError>(),
        Some(EtlError::SourceNotFound(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
