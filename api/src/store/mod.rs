//! Access to the hosted tabular store.
//!
//! Everything that reads or writes rows goes through [`TabularStore`]. Rows
//! travel as JSON objects and are decoded into typed models with
//! [`fetch_all`] and [`fetch_one`].

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[cfg(test)]
pub mod mock;
pub mod postgrest;

/// Postgres `undefined_table`.
pub const UNDEFINED_TABLE: &str = "42P01";
/// PostgREST could not find a relationship between the two tables.
pub const RELATIONSHIP_NOT_FOUND: &str = "PGRST200";
/// PostgREST could not find the table in its schema cache.
pub const TABLE_NOT_IN_SCHEMA_CACHE: &str = "PGRST205";
/// PostgREST was asked for a single object but got zero (or many) rows.
pub const SINGLE_ROW_MISMATCH: &str = "PGRST116";
/// Postgres `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Filter::Eq(column.to_string(), value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A related table attached to every returned row under `alias`, joined
/// through `foreign_key` on the base table.
#[derive(Clone, Debug, PartialEq)]
pub struct Embed {
    pub alias: String,
    pub foreign_key: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub table: String,
    pub embed: Option<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    /// Exactly one row must match, otherwise the store answers with
    /// [`StoreErrorKind::NotFound`].
    pub single: bool,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Select {
            table: table.to_string(),
            embed: None,
            filters: vec![],
            order: None,
            limit: None,
            single: false,
        }
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The request never produced a response.
    Transport,
    Timeout,
    /// The response did not have the expected shape.
    Decode,
    /// Missing table or missing relationship between tables.
    RelationNotFound,
    /// Zero rows where exactly one was required.
    NotFound,
    /// Any other error reported by the store.
    Query,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreErrorKind::Transport => "transport error",
            StoreErrorKind::Timeout => "timed out",
            StoreErrorKind::Decode => "malformed response",
            StoreErrorKind::RelationNotFound => "relation not found",
            StoreErrorKind::NotFound => "row not found",
            StoreErrorKind::Query => "query error",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Machine-readable code as reported by the store, if any.
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        StoreError {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Classifies an error reported by the store from its code.
    pub fn from_code(code: Option<String>, message: impl Into<String>) -> Self {
        let kind = match code.as_deref() {
            Some(UNDEFINED_TABLE | RELATIONSHIP_NOT_FOUND | TABLE_NOT_IN_SCHEMA_CACHE) => {
                StoreErrorKind::RelationNotFound
            }
            Some(SINGLE_ROW_MISMATCH) => StoreErrorKind::NotFound,
            _ => StoreErrorKind::Query,
        };
        StoreError {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(table: &str) -> Self {
        StoreError::new(StoreErrorKind::NotFound, format!("no matching row in `{table}`"))
    }

    pub fn decode(e: serde_json::Error) -> Self {
        StoreError::new(StoreErrorKind::Decode, e.to_string())
    }

    pub fn is_relation_not_found(&self) -> bool {
        self.kind == StoreErrorKind::RelationNotFound
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION)
    }
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, StoreError>;

    /// Inserts `rows` and returns them as stored.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError>;

    /// Applies `patch` to every row matching `filters`, returning the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;
}

pub async fn fetch_all<T, S>(store: &S, query: &Select) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: TabularStore + ?Sized,
{
    store
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::decode))
        .collect()
}

/// Fetches exactly one row. The query is constrained to a single row even if
/// the caller forgot to.
pub async fn fetch_one<T, S>(store: &S, query: &Select) -> Result<T, StoreError>
where
    T: DeserializeOwned,
    S: TabularStore + ?Sized,
{
    let query = if query.single {
        query.clone()
    } else {
        query.clone().single()
    };
    let row = single_row(store.select(&query).await?, &query.table)?;
    serde_json::from_value(row).map_err(StoreError::decode)
}

/// Inserts one row and decodes the stored representation.
pub async fn insert_one<T, S>(store: &S, table: &str, row: Value) -> Result<T, StoreError>
where
    T: DeserializeOwned,
    S: TabularStore + ?Sized,
{
    let row = single_row(store.insert(table, vec![row]).await?, table)?;
    serde_json::from_value(row).map_err(StoreError::decode)
}

pub(crate) fn single_row(rows: Vec<Value>, table: &str) -> Result<Value, StoreError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(row),
        (None, _) => Err(StoreError::not_found(table)),
        (Some(_), Some(_)) => Err(StoreError::from_code(
            Some(SINGLE_ROW_MISMATCH.to_string()),
            format!("more than one row in `{table}` where one was expected"),
        )),
    }
}
