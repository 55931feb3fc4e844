use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::SupabaseConfig;

use super::{Embed, Filter, Select, StoreError, StoreErrorKind, TabularStore};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// [`TabularStore`] over the hosted PostgREST endpoint (`/rest/v1`).
///
/// Requests are authorized with the anon key, or with the signed-in user's
/// access token when one is attached via [`PostgrestClient::with_access_token`]
/// so that row level security applies to that user.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize, Default)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl PostgrestClient {
    pub fn new(http: reqwest::Client, config: &SupabaseConfig, timeout: Duration) -> Self {
        PostgrestClient {
            http,
            base_url: format!("{}/rest/v1", config.url),
            api_key: config.anon_key.clone(),
            access_token: None,
            timeout,
        }
    }

    pub fn with_access_token(&self, token: Option<&str>) -> Self {
        PostgrestClient {
            access_token: token.map(str::to_string),
            ..self.clone()
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn run(&self, req: RequestBuilder, table: &str) -> Result<Vec<Value>, StoreError> {
        match tokio::time::timeout(self.timeout, send(req)).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(table = %table, timeout = ?self.timeout, "store request timed out");
                Err(StoreError::new(
                    StoreErrorKind::Timeout,
                    format!("request to `{table}` timed out after {:?}", self.timeout),
                ))
            }
        }
    }
}

async fn send(req: RequestBuilder) -> Result<Vec<Value>, StoreError> {
    let resp = req.send().await.map_err(transport)?;
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport)?;

    if !status.is_success() {
        return Err(error_from_response(status, &body));
    }

    decode_rows(&body)
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::new(StoreErrorKind::Transport, e.to_string())
}

pub(crate) fn error_from_response(status: StatusCode, body: &[u8]) -> StoreError {
    let parsed: PostgrestErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = match (parsed.message, parsed.details) {
        (Some(m), Some(d)) => format!("{m} ({d})"),
        (Some(m), None) => m,
        (None, _) => format!("store responded with {status}"),
    };

    match parsed.code {
        Some(code) => StoreError::from_code(Some(code), message),
        // PostgREST only answers 404 without a code for unknown resources
        None if status == StatusCode::NOT_FOUND => {
            StoreError::new(StoreErrorKind::RelationNotFound, message)
        }
        None => StoreError::new(StoreErrorKind::Query, message),
    }
}

pub(crate) fn decode_rows(body: &[u8]) -> Result<Vec<Value>, StoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(vec![]);
    }

    match serde_json::from_slice::<Value>(body).map_err(StoreError::decode)? {
        Value::Array(rows) => Ok(rows),
        row @ Value::Object(_) => Ok(vec![row]),
        other => Err(StoreError::new(
            StoreErrorKind::Decode,
            format!("expected rows, got `{other}`"),
        )),
    }
}

pub(crate) fn select_columns(embed: Option<&Embed>) -> String {
    match embed {
        Some(e) => format!("*,{}:{}({})", e.alias, e.foreign_key, e.columns.join(",")),
        None => "*".to_string(),
    }
}

pub(crate) fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, value) => (column.clone(), format!("eq.{value}")),
    }
}

pub(crate) fn select_params(query: &Select) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), select_columns(query.embed.as_ref()))];
    params.extend(query.filters.iter().map(filter_param));
    if let Some(order) = &query.order {
        params.push((
            "order".to_string(),
            format!("{}.{}", order.column, order.direction.as_str()),
        ));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl TabularStore for PostgrestClient {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, StoreError> {
        let mut req = self
            .request(Method::GET, &query.table)
            .query(&select_params(query));
        if query.single {
            req = req.header(reqwest::header::ACCEPT, SINGLE_OBJECT);
        }

        tracing::debug!(table = %query.table, single = query.single, embed = query.embed.is_some(), "select");
        self.run(req, &query.table).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let req = self
            .request(Method::POST, table)
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .json(&rows);

        tracing::debug!(table = %table, rows = rows.len(), "insert");
        self.run(req, table).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let req = self
            .request(Method::PATCH, table)
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&patch);

        tracing::debug!(table = %table, "update");
        self.run(req, table).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        // an unfiltered DELETE would wipe the table
        if filters.is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::Query,
                format!("refusing to delete from `{table}` without filters"),
            ));
        }

        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let req = self
            .request(Method::DELETE, table)
            .query(&params)
            .header("Prefer", "return=minimal");

        tracing::debug!(table = %table, "delete");
        self.run(req, table).await.map(|_| ())
    }
}
