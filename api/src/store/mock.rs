//! Scripted in-memory store for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Filter, Select, StoreError, TabularStore};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Select(Select),
    Insert { table: String, rows: Vec<Value> },
    Update { table: String, filters: Vec<Filter>, patch: Value },
    Delete { table: String, filters: Vec<Filter> },
}

type Handler = Box<dyn Fn(&Call) -> Result<Vec<Value>, StoreError> + Send + Sync>;

/// Answers every call with the handler's result and records the call.
pub struct MockStore {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
}

impl MockStore {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Call) -> Result<Vec<Value>, StoreError> + Send + Sync + 'static,
    {
        MockStore {
            handler: Box::new(handler),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count<P: Fn(&Call) -> bool>(&self, predicate: P) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn answer(&self, call: Call) -> Result<Vec<Value>, StoreError> {
        let result = (self.handler)(&call);
        self.calls.lock().unwrap().push(call);
        result
    }
}

/// Value of the first `eq` filter on `column`, if any.
pub fn eq_value<'a>(filters: &'a [Filter], column: &str) -> Option<&'a str> {
    filters.iter().find_map(|f| match f {
        Filter::Eq(c, v) if c == column => Some(v.as_str()),
        _ => None,
    })
}

#[async_trait]
impl TabularStore for MockStore {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, StoreError> {
        self.answer(Call::Select(query.clone()))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        self.answer(Call::Insert {
            table: table.to_string(),
            rows,
        })
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        self.answer(Call::Update {
            table: table.to_string(),
            filters: filters.to_vec(),
            patch,
        })
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        self.answer(Call::Delete {
            table: table.to_string(),
            filters: filters.to_vec(),
        })
        .map(|_| ())
    }
}
