//! Databricks SQL warehouse backend over the Statement Execution REST API.
//!
//! Statements are submitted with named parameters (`:name`) and running
//! statements are polled. The bulk read asks for external links, since
//! inline results are capped well below the size of the full table; each
//! link is a pre-signed URL holding one chunk as a JSON array of strings.
//! DML statements answer with a single small inline row.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::WarehouseConfig;
use crate::error::{AppError, Result};
use crate::models::{Column, ColumnValue, NewObservation, RawObservation, ValueKind};

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

// ---

pub struct WarehouseClient {
    http: Client,
    base_url: String,
    token: String,
    warehouse_id: String,
    table: String,
    municipality_column: String,
    department_column: String,
    max_polls: u32,
    poll_interval: Duration,
}

/// Where the warehouse puts a statement's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Disposition {
    Inline,
    ExternalLinks,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    wait_timeout: &'static str,
    on_wait_timeout: &'static str,
    format: &'static str,
    disposition: Disposition,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter>,
}

/// A named, typed statement parameter. The warehouse receives every value
/// as text and casts it to `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatementParameter {
    name: &'static str,
    value: String,
    #[serde(rename = "type")]
    type_name: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: StatementState,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: ManifestSchema,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
    #[serde(default)]
    position: usize,
}

type Rows = Vec<Vec<Option<String>>>;

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Rows,
    #[serde(default)]
    external_links: Vec<ExternalLink>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalLink {
    #[serde(default)]
    chunk_index: usize,
    external_link: String,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

impl ResultChunk {
    /// Link to the following chunk, wherever this chunk carries it.
    fn take_next_link(&mut self) -> Option<String> {
        // ---
        self.next_chunk_internal_link
            .take()
            .or_else(|| self.external_links.pop()?.next_chunk_internal_link)
    }
}

/// Column names and rows of a finished statement.
#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Rows,
}

// ---

impl WarehouseClient {
    pub fn new(config: &WarehouseConfig, table: &str) -> Result<Self> {
        // ---
        let server = config.server.trim().trim_end_matches('/');
        let base_url = if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("https://{server}")
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(WarehouseClient {
            http,
            base_url,
            token: config.api_key.clone(),
            warehouse_id: config.warehouse_id.clone(),
            table: table.to_string(),
            municipality_column: config.municipality_column.clone(),
            department_column: config.department_column.clone(),
            max_polls: config.max_polls,
            poll_interval: Duration::from_millis(u64::from(config.poll_interval_ms)),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<RawObservation>> {
        // ---
        let statement = self.select_statement();
        let table = self
            .execute(&statement, Vec::new(), Disposition::ExternalLinks)
            .await?;
        rows_to_observations(&table)
    }

    /// Physical column name in the warehouse table.
    fn source_column(&self, column: Column) -> &str {
        match column {
            Column::Municipality => &self.municipality_column,
            Column::Department => &self.department_column,
            other => other.name(),
        }
    }

    /// Bulk read, renaming physical columns to the names used in code.
    fn select_statement(&self) -> String {
        // ---
        let columns = Column::ALL
            .iter()
            .map(|&c| match self.source_column(c) {
                name if name == c.name() => name.to_string(),
                name => format!("{name} AS {}", c.name()),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {columns} FROM {}", self.table)
    }

    pub async fn insert(&self, row: &NewObservation) -> Result<u64> {
        // ---
        let columns = Column::ALL
            .iter()
            .map(|&c| self.source_column(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = Column::ALL
            .iter()
            .map(|c| format!(":{}", c.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table, columns, placeholders
        );
        let table = self
            .execute(&statement, insert_parameters(row), Disposition::Inline)
            .await?;
        Ok(affected_rows(&table))
    }

    pub async fn update(&self, station_code: &str, column: Column, value: &ColumnValue) -> Result<u64> {
        // ---
        let statement = format!(
            "UPDATE {} SET {} = :value WHERE station_code = :station_code",
            self.table,
            self.source_column(column)
        );
        let params = vec![
            parameter("value", column.kind(), value.to_param_string()),
            parameter("station_code", ValueKind::Text, station_code.to_string()),
        ];
        let table = self.execute(&statement, params, Disposition::Inline).await?;
        Ok(affected_rows(&table))
    }

    pub async fn delete(&self, station_code: &str) -> Result<u64> {
        // ---
        let statement = format!("DELETE FROM {} WHERE station_code = :station_code", self.table);
        let params = vec![parameter(
            "station_code",
            ValueKind::Text,
            station_code.to_string(),
        )];
        let table = self.execute(&statement, params, Disposition::Inline).await?;
        Ok(affected_rows(&table))
    }

    /// Run one statement to completion and collect every result chunk.
    async fn execute(
        &self,
        statement: &str,
        parameters: Vec<StatementParameter>,
        disposition: Disposition,
    ) -> Result<Table> {
        // ---
        let body = StatementRequest {
            warehouse_id: &self.warehouse_id,
            statement,
            wait_timeout: "30s",
            on_wait_timeout: "CONTINUE",
            format: "JSON_ARRAY",
            disposition,
            parameters,
        };
        tracing::debug!("Submitting statement: {}", statement);

        let url = format!("{}{}/", self.base_url, STATEMENTS_PATH);
        let mut response: StatementResponse =
            send_json(self.http.post(&url).bearer_auth(&self.token).json(&body)).await?;

        let mut polls = 0;
        while matches!(
            response.status.state,
            StatementState::Pending | StatementState::Running
        ) {
            if polls >= self.max_polls {
                return Err(AppError::Query(format!(
                    "statement {} still {:?} after {} polls",
                    response.statement_id, response.status.state, polls
                )));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            let url = format!(
                "{}{}/{}",
                self.base_url, STATEMENTS_PATH, response.statement_id
            );
            response = send_json(self.http.get(&url).bearer_auth(&self.token)).await?;
            tracing::debug!(
                "Statement {} poll {}: {:?}",
                response.statement_id,
                polls,
                response.status.state
            );
        }

        if response.status.state != StatementState::Succeeded {
            let detail = response
                .status
                .error
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.error_code.unwrap_or_else(|| "ERROR".into()),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| "no error details".into());
            return Err(AppError::Query(format!(
                "statement {} {:?}: {}",
                response.statement_id, response.status.state, detail
            )));
        }

        let mut table = Table {
            columns: response
                .manifest
                .map(|m| column_names(m.schema.columns))
                .unwrap_or_default(),
            rows: Vec::new(),
        };

        let mut chunk = response.result.unwrap_or_default();
        let mut chunks = 1;
        loop {
            table.rows.append(&mut chunk.data_array);
            for link in &chunk.external_links {
                // Pre-signed: the bearer token must not be sent along.
                tracing::debug!("Downloading result chunk {}", link.chunk_index);
                let mut rows: Rows = send_json(self.http.get(&link.external_link)).await?;
                table.rows.append(&mut rows);
            }
            let Some(link) = chunk.take_next_link() else {
                break;
            };
            chunks += 1;
            tracing::debug!("Fetching result chunk {}: {}", chunks, link);
            let url = format!("{}{}", self.base_url, link);
            chunk = send_json(self.http.get(&url).bearer_auth(&self.token)).await?;
        }

        tracing::debug!(
            "Statement {} returned {} rows in {} chunks",
            response.statement_id,
            table.rows.len(),
            chunks
        );
        Ok(table)
    }
}

/// Send a request and decode a JSON body, turning HTTP error statuses into
/// query errors that carry the warehouse's message.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    // ---
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Query(format!("warehouse returned {status}: {body}")));
    }
    Ok(response.json().await?)
}

fn column_names(mut columns: Vec<ColumnInfo>) -> Vec<String> {
    columns.sort_by_key(|c| c.position);
    columns.into_iter().map(|c| c.name).collect()
}

fn parameter(name: &'static str, kind: ValueKind, value: String) -> StatementParameter {
    // ---
    let type_name = match kind {
        ValueKind::Text => "STRING",
        ValueKind::Number => "DOUBLE",
        ValueKind::Date => "DATE",
    };
    StatementParameter {
        name,
        value,
        type_name,
    }
}

fn insert_parameters(row: &NewObservation) -> Vec<StatementParameter> {
    // ---
    Column::ALL
        .iter()
        .map(|&column| {
            let value = match column {
                Column::Date => row.date.format("%Y-%m-%d").to_string(),
                Column::StationCode => row.station_code.clone(),
                Column::Municipality => row.municipality.clone(),
                Column::Department => row.department.clone(),
                Column::Latitude => row.latitude.to_string(),
                Column::Longitude => row.longitude.to_string(),
                Column::TempMin => row.temp_min.to_string(),
                Column::TempAvg => row.temp_avg.to_string(),
                Column::TempMax => row.temp_max.to_string(),
            };
            parameter(column.name(), column.kind(), value)
        })
        .collect()
}

/// DML statements answer with a single `num_affected_rows` row.
fn affected_rows(table: &Table) -> u64 {
    // ---
    table
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_deref())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn rows_to_observations(table: &Table) -> Result<Vec<RawObservation>> {
    // ---
    let index = |column: Column| {
        table
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column.name()))
            .ok_or_else(|| {
                AppError::Query(format!("result is missing column {}", column.name()))
            })
    };
    let idx: Vec<usize> = Column::ALL.iter().map(|&c| index(c)).collect::<Result<_>>()?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| -> Result<RawObservation> {
            let cell = |c: usize| row.get(idx[c]).and_then(|v| v.as_deref());
            let text = |c: usize| {
                cell(c).map(str::to_string).ok_or_else(|| {
                    AppError::Query(format!("row {r}: {} is null", Column::ALL[c].name()))
                })
            };
            let number = |c: usize| -> Result<Option<f64>> {
                cell(c)
                    .map(|v| {
                        v.trim().parse::<f64>().map_err(|_| {
                            AppError::Query(format!(
                                "row {r}: {} is not a number: {v:?}",
                                Column::ALL[c].name()
                            ))
                        })
                    })
                    .transpose()
            };
            let required = |c: usize| -> Result<f64> {
                number(c)?.ok_or_else(|| {
                    AppError::Query(format!("row {r}: {} is null", Column::ALL[c].name()))
                })
            };

            Ok(RawObservation {
                date: text(0)?,
                station_code: text(1)?,
                municipality: text(2)?,
                department: text(3)?,
                latitude: required(4)?,
                longitude: required(5)?,
                temp_min: number(6)?,
                temp_avg: number(7)?,
                temp_max: number(8)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_statement_response_decoding() {
        // ---
        let body = json!({
            "statement_id": "01ef-abc",
            "status": { "state": "SUCCEEDED" },
            "manifest": {
                "format": "JSON_ARRAY",
                "schema": {
                    "column_count": 9,
                    "columns": [
                        { "name": "station_code", "position": 1, "type_name": "STRING" },
                        { "name": "date", "position": 0, "type_name": "DATE" },
                        { "name": "municipality", "position": 2, "type_name": "STRING" },
                        { "name": "department", "position": 3, "type_name": "STRING" },
                        { "name": "latitude", "position": 4, "type_name": "DOUBLE" },
                        { "name": "longitude", "position": 5, "type_name": "DOUBLE" },
                        { "name": "temp_min", "position": 6, "type_name": "DOUBLE" },
                        { "name": "temp_avg", "position": 7, "type_name": "DOUBLE" },
                        { "name": "temp_max", "position": 8, "type_name": "DOUBLE" }
                    ]
                }
            },
            "result": {
                "chunk_index": 0,
                "row_count": 2,
                "data_array": [
                    ["2017-01-01", "27015330", " MEDELLÍN", "ANTIOQUIA", "6.25", "-75.56", "16.2", "22.4", "28.9"],
                    ["2017-01-02", "27015330", "MEDELLÍN", "ANTIOQUIA", "6.25", "-75.56", null, "21.8", "27.5"]
                ],
                "next_chunk_index": 1,
                "next_chunk_internal_link": "/api/2.0/sql/statements/01ef-abc/result/chunks/1"
            }
        });

        let response: StatementResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status.state, StatementState::Succeeded);
        let result = response.result.unwrap();
        assert_eq!(
            result.next_chunk_internal_link.as_deref(),
            Some("/api/2.0/sql/statements/01ef-abc/result/chunks/1")
        );

        let table = Table {
            columns: column_names(response.manifest.unwrap().schema.columns),
            rows: result.data_array,
        };
        let rows = rows_to_observations(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2017-01-01");
        assert_eq!(rows[0].municipality, " MEDELLÍN");
        assert_eq!(rows[0].temp_avg, Some(22.4));
        assert_eq!(rows[1].temp_min, None);
        assert_eq!(rows[1].latitude, 6.25);
    }

    #[test]
    fn test_failed_statement_decoding() {
        // ---
        let body = json!({
            "statement_id": "01ef-def",
            "status": {
                "state": "FAILED",
                "error": { "error_code": "BAD_REQUEST", "message": "[TABLE_OR_VIEW_NOT_FOUND]" }
            }
        });
        let response: StatementResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status.state, StatementState::Failed);
        let error = response.status.error.unwrap();
        assert_eq!(error.message.as_deref(), Some("[TABLE_OR_VIEW_NOT_FOUND]"));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_missing_column_and_bad_number() {
        // ---
        let columns: Vec<String> = Column::ALL.iter().map(|c| c.name().to_string()).collect();

        let short = Table {
            columns: columns[..8].to_vec(),
            rows: vec![],
        };
        assert!(matches!(rows_to_observations(&short), Err(AppError::Query(_))));

        let row = |lat: &str| {
            ["2020-01-01", "S", "M", "D", lat, "1", "1", "2", "3"]
                .iter()
                .map(|v| Some(v.to_string()))
                .collect::<Vec<_>>()
        };
        let bad = Table {
            columns: columns.clone(),
            rows: vec![row("north")],
        };
        assert!(rows_to_observations(&bad).is_err());

        let good = Table {
            columns,
            rows: vec![row("4.5")],
        };
        assert_eq!(rows_to_observations(&good).unwrap()[0].latitude, 4.5);
    }

    #[test]
    fn test_insert_values_travel_as_parameters() {
        // ---
        let row = NewObservation {
            date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            station_code: "X'); DROP TABLE t; --".to_string(),
            municipality: "TUNJA".to_string(),
            department: "BOYACÁ".to_string(),
            latitude: 5.53,
            longitude: -73.36,
            temp_min: 6.5,
            temp_avg: 13.0,
            temp_max: 19.5,
        };
        let params = insert_parameters(&row);
        assert_eq!(params.len(), 9);
        assert_eq!(params[0], parameter("date", ValueKind::Date, "2023-02-01".into()));
        assert_eq!(params[1].value, "X'); DROP TABLE t; --");
        assert_eq!(params[1].type_name, "STRING");
        assert_eq!(params[8], parameter("temp_max", ValueKind::Number, "19.5".into()));

        let json = serde_json::to_value(&params[4]).unwrap();
        assert_eq!(json, json!({ "name": "latitude", "value": "5.53", "type": "DOUBLE" }));
    }

    #[test]
    fn test_affected_rows() {
        // ---
        let table = Table {
            columns: vec!["num_affected_rows".into(), "num_inserted_rows".into()],
            rows: vec![vec![Some("3".into()), Some("0".into())]],
        };
        assert_eq!(affected_rows(&table), 3);
        assert_eq!(affected_rows(&Table::default()), 0);
    }

    fn warehouse_config(server: &str, max_polls: u32) -> WarehouseConfig {
        // ---
        WarehouseConfig {
            server: server.into(),
            http_path: "/sql/1.0/warehouses/w1".into(),
            api_key: "k".into(),
            warehouse_id: "w1".into(),
            max_polls,
            poll_interval_ms: 1,
            municipality_column: "municipio".into(),
            department_column: "departamento".into(),
        }
    }

    #[test]
    fn test_base_url() {
        // ---
        let cfg = warehouse_config("adb-1.azuredatabricks.net/", 1);
        let client = WarehouseClient::new(&cfg, "t").unwrap();
        assert_eq!(client.base_url, "https://adb-1.azuredatabricks.net");

        let local = WarehouseConfig {
            server: "http://127.0.0.1:9999".into(),
            ..cfg
        };
        assert_eq!(WarehouseClient::new(&local, "t").unwrap().base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_spanish_columns_are_aliased() {
        // ---
        let client = WarehouseClient::new(&warehouse_config("localhost", 1), "brz.t").unwrap();
        assert_eq!(
            client.select_statement(),
            "SELECT date, station_code, municipio AS municipality, departamento AS department, \
             latitude, longitude, temp_min, temp_avg, temp_max FROM brz.t"
        );
        assert_eq!(client.source_column(Column::TempMax), "temp_max");
        assert_eq!(client.source_column(Column::Department), "departamento");
    }

    // --- stub warehouse over HTTP

    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::{header::AUTHORIZATION, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;

    #[derive(Clone)]
    struct Stub {
        base: String,
        mode: StubMode,
        submitted: Arc<Mutex<Vec<Value>>>,
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum StubMode {
        /// RUNNING once, then SUCCEEDED with two linked chunks.
        Chunked,
        /// Never leaves RUNNING.
        Stuck,
        /// Rejects the token.
        Forbidden,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer k")
    }

    fn stub_row(date: &str, max: &str) -> Value {
        json!([date, "27015330", "MEDELLÍN", "ANTIOQUIA", "6.25", "-75.56", "16.0", "22.0", max])
    }

    async fn submit(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
        // ---
        if stub.mode == StubMode::Forbidden || !authorized(&headers) {
            return (StatusCode::FORBIDDEN, "Invalid access token").into_response();
        }
        stub.submitted.lock().unwrap().push(body);
        Json(json!({ "statement_id": "s1", "status": { "state": "RUNNING" } })).into_response()
    }

    async fn status(State(stub): State<Stub>, Path(id): Path<String>, headers: HeaderMap) -> Response {
        // ---
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if stub.mode == StubMode::Stuck {
            return Json(json!({ "statement_id": id, "status": { "state": "RUNNING" } })).into_response();
        }
        let columns: Vec<Value> = Column::ALL
            .iter()
            .enumerate()
            .map(|(i, c)| json!({ "name": c.name(), "position": i }))
            .collect();
        Json(json!({
            "statement_id": id,
            "status": { "state": "SUCCEEDED" },
            "manifest": { "format": "JSON_ARRAY", "schema": { "columns": columns } },
            "result": {
                "external_links": [{
                    "chunk_index": 0,
                    "external_link": format!("{}/presigned/0", stub.base),
                    "next_chunk_internal_link": format!("/api/2.0/sql/statements/{id}/result/chunks/1")
                }]
            }
        }))
        .into_response()
    }

    async fn chunk(
        State(stub): State<Stub>,
        Path((id, index)): Path<(String, usize)>,
        headers: HeaderMap,
    ) -> Response {
        // ---
        if !authorized(&headers) || id != "s1" || index != 1 {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(json!({
            "external_links": [{
                "chunk_index": 1,
                "external_link": format!("{}/presigned/1", stub.base)
            }]
        }))
        .into_response()
    }

    async fn presigned(Path(index): Path<usize>, headers: HeaderMap) -> Response {
        // ---
        if headers.contains_key(AUTHORIZATION) {
            return StatusCode::BAD_REQUEST.into_response();
        }
        match index {
            0 => Json(json!([stub_row("2020-01-01", "28.0"), stub_row("2020-01-02", "27.5")])).into_response(),
            1 => Json(json!([stub_row("2020-01-03", "29.1")])).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_stub(mode: StubMode) -> (String, Arc<Mutex<Vec<Value>>>) {
        // ---
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let stub = Stub {
            base: base.clone(),
            mode,
            submitted: submitted.clone(),
        };
        let app = Router::new()
            .route("/api/2.0/sql/statements/", post(submit))
            .route("/api/2.0/sql/statements/{id}", get(status))
            .route("/api/2.0/sql/statements/{id}/result/chunks/{index}", get(chunk))
            .route("/presigned/{index}", get(presigned))
            .with_state(stub);
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        (base, submitted)
    }

    #[tokio::test]
    async fn test_fetch_all_polls_and_follows_every_chunk() {
        // ---
        let (base, submitted) = spawn_stub(StubMode::Chunked).await;
        let client = WarehouseClient::new(&warehouse_config(&base, 5), "brz.t").unwrap();

        let rows = client.fetch_all().await.unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2020-01-01", "2020-01-02", "2020-01-03"]);
        assert_eq!(rows[2].temp_max, Some(29.1));

        let submitted = submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0]["disposition"], "EXTERNAL_LINKS");
        assert_eq!(submitted[0]["warehouse_id"], "w1");
        assert!(submitted[0].get("parameters").is_none());
    }

    #[tokio::test]
    async fn test_statement_stuck_running_gives_up() {
        // ---
        let (base, _) = spawn_stub(StubMode::Stuck).await;
        let client = WarehouseClient::new(&warehouse_config(&base, 3), "brz.t").unwrap();

        match client.fetch_all().await {
            Err(AppError::Query(msg)) => assert!(msg.contains("after 3 polls"), "{msg}"),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_becomes_query_error() {
        // ---
        let (base, _) = spawn_stub(StubMode::Forbidden).await;
        let client = WarehouseClient::new(&warehouse_config(&base, 3), "brz.t").unwrap();

        match client.delete("27015330").await {
            Err(AppError::Query(msg)) => {
                assert!(msg.contains("403"), "{msg}");
                assert!(msg.contains("Invalid access token"), "{msg}");
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }
}
