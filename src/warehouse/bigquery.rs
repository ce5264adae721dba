//! BigQuery over its REST API.
//!
//! Statements go to `jobs.query` with `parameterMode: NAMED`; every filter
//! value is sent in `queryParameters` with its declared type and BigQuery
//! substitutes it server-side. Long-running jobs and multi-page results are
//! followed up with `jobs.getQueryResults`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{Row, Warehouse};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::query::{Dialect, ParameterType, QueryParameter};

/// Extra time the HTTP request gets beyond the `timeoutMs` long poll.
pub const HTTP_HEADROOM: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BigQueryClient {
    client: Client,
    api_url: String,
    project_id: String,
    access_token: Option<String>,
    location: Option<String>,
    table: String,
    timeout: Duration,
}

impl BigQueryClient {
    /// `timeout` is the server-side wait sent as `timeoutMs`. The HTTP client
    /// allows [`HTTP_HEADROOM`] on top so BigQuery can answer
    /// `jobComplete: false` before the request is abandoned.
    pub fn new(api_url: &str, project_id: &str, table: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout + HTTP_HEADROOM).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            access_token: None,
            location: None,
            table: table.to_string(),
            timeout,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let project_id = settings.bigquery_project_id.as_deref().ok_or_else(|| {
            Error::Config(config::ConfigError::Message(
                "bigquery_project_id is required for the bigquery backend".to_string(),
            ))
        })?;

        let mut client = Self::new(
            &settings.bigquery_api_url,
            project_id,
            settings.table(),
            settings.query_timeout(),
        )?;
        if let Some(token) = &settings.bigquery_access_token {
            client = client.with_access_token(token.as_str());
        }
        if let Some(location) = &settings.bigquery_location {
            client = client.with_location(location.as_str());
        }
        Ok(client)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn queries_url(&self) -> String {
        format!("{}/projects/{}/queries", self.api_url, self.project_id)
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    async fn send(&self, request: RequestBuilder) -> Result<QueryResponse> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::query(format!("BigQuery error {status}: {message}")));
        }

        let body = resp.bytes().await?;
        let parsed: QueryResponse = serde_json::from_slice(&body)?;
        if let Some(first) = parsed.errors.first() {
            return Err(Error::query(format!(
                "BigQuery job error ({}): {}",
                first.reason.as_deref().unwrap_or("unknown"),
                first.message
            )));
        }
        Ok(parsed)
    }

    async fn start_query(&self, sql: &str, parameters: &[QueryParameter]) -> Result<QueryResponse> {
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: parameters.iter().map(ApiParameter::from).collect(),
            timeout_ms: self.timeout_ms(),
            location: self.location.as_deref(),
            request_id: Uuid::new_v4().to_string(),
        };
        self.send(self.client.post(self.queries_url()).json(&body))
            .await
    }

    async fn query_results(&self, job: &JobReference, page_token: Option<&str>) -> Result<QueryResponse> {
        let url = format!("{}/{}", self.queries_url(), job.job_id);
        let mut params = vec![("timeoutMs", self.timeout_ms().to_string())];
        if let Some(location) = job.location.as_deref().or(self.location.as_deref()) {
            params.push(("location", location.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.send(self.client.get(url).query(&params)).await
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    fn dialect(&self) -> Dialect {
        Dialect::BigQuery
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn run(&self, sql: &str, parameters: &[QueryParameter]) -> Result<Vec<Row>> {
        let mut response = self.start_query(sql, parameters).await?;
        let job = response.job_reference.clone();
        let mut fields: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut pages = 0usize;

        loop {
            let mut page_token = None;
            if response.job_complete {
                if fields.is_none() {
                    fields = response.schema.take().map(|s| s.field_names());
                }
                let names = fields.as_deref().unwrap_or_default();
                for row in response.rows.drain(..) {
                    rows.push(row.decode(names)?);
                }
                pages += 1;
                match response.page_token.take() {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            let job = job
                .as_ref()
                .ok_or_else(|| Error::internal("BigQuery response is missing jobReference"))?;
            response = self.query_results(job, page_token.as_deref()).await?;
        }

        debug!(
            job_id = job.as_ref().map(|j| j.job_id.as_str()).unwrap_or(""),
            pages,
            rows = rows.len(),
            "bigquery query complete"
        );
        Ok(rows)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<ApiParameter<'a>>,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiParameter<'a> {
    name: &'a str,
    parameter_type: ApiParameterType,
    parameter_value: ApiParameterValue<'a>,
}

#[derive(Debug, Serialize)]
struct ApiParameterType {
    #[serde(rename = "type")]
    kind: ParameterType,
}

#[derive(Debug, Serialize)]
struct ApiParameterValue<'a> {
    value: &'a str,
}

impl<'a> From<&'a QueryParameter> for ApiParameter<'a> {
    fn from(param: &'a QueryParameter) -> Self {
        Self {
            name: param.name,
            parameter_type: ApiParameterType {
                kind: param.param_type,
            },
            parameter_value: ApiParameterValue {
                value: &param.value,
            },
        }
    }
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

impl TableSchema {
    fn field_names(self) -> Vec<String> {
        self.fields.into_iter().map(|f| f.name).collect()
    }
}

#[derive(Debug, Deserialize)]
struct TableField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

impl TableRow {
    fn decode(self, names: &[String]) -> Result<Row> {
        if self.f.len() != names.len() {
            return Err(Error::internal(format!(
                "BigQuery row has {} cells but schema has {} fields",
                self.f.len(),
                names.len()
            )));
        }
        Ok(names
            .iter()
            .cloned()
            .zip(self.f.into_iter().map(|cell| cell.v))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
