//! Core Database Backend Trait

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::DbResult;

/// One result row, columns in select order
pub type Row = Vec<JsonValue>;

/// Abstract database connection.
///
/// Calls are awaited one at a time; implementations never see two
/// statements in flight on the same connection.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a single statement and return its rows (empty for DDL/DML)
    async fn execute(&mut self, sql: &str) -> DbResult<Vec<Row>>;
}

#[async_trait]
impl<C: DatabaseConnection + ?Sized> DatabaseConnection for Box<C> {
    async fn execute(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        (**self).execute(sql).await
    }
}

/// Render a column value as text. Strings come back unquoted.
pub fn value_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
