//! In-memory backend
//!
//! Understands the marker-table statements issued by `VersionTracker` and
//! records everything else it is asked to run. Used to exercise the engine
//! without a ClickHouse server.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::core::{DatabaseConnection, Row};
use crate::error::{DatabaseError, DbResult};
use crate::tracker::DEFAULT_TABLE;

#[derive(Debug, Clone)]
pub struct MemoryConnection {
    table: String,
    table_exists: bool,
    marker_rows: Vec<String>,
    executed: Vec<String>,
    failures: Vec<String>,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::with_table(DEFAULT_TABLE)
    }
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose marker table has another name
    pub fn with_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            table_exists: false,
            marker_rows: Vec::new(),
            executed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Start with the marker table present and holding `version`
    pub fn at_version(version: &str) -> Self {
        let mut conn = Self::default();
        conn.table_exists = true;
        conn.marker_rows.push(version.to_string());
        conn
    }

    /// Fail every later statement containing `pattern`
    pub fn fail_when(&mut self, pattern: impl Into<String>) {
        self.failures.push(pattern.into());
    }

    /// Stop failing statements
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Every statement that succeeded, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Successful statements that did not target the marker table
    pub fn script_statements(&self) -> Vec<&str> {
        self.executed
            .iter()
            .filter(|sql| !sql.contains(self.table.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn marker_rows(&self) -> &[String] {
        &self.marker_rows
    }

    fn marker_statement(&mut self, sql: &str) -> DbResult<Option<Vec<Row>>> {
        let upper = sql.trim().to_uppercase();
        let table = self.table.to_uppercase();

        if upper.starts_with(&format!("CREATE TABLE IF NOT EXISTS {}", table)) {
            self.table_exists = true;
            return Ok(Some(Vec::new()));
        }

        let targets_table = upper.starts_with(&format!("SELECT VERSION FROM {}", table))
            || upper.starts_with(&format!("TRUNCATE TABLE {}", table))
            || upper.starts_with(&format!("INSERT INTO {}", table));
        if !targets_table {
            return Ok(None);
        }

        if !self.table_exists {
            return Err(DatabaseError::Query(format!(
                "Table {} doesn't exist",
                self.table
            )));
        }

        if upper.starts_with("SELECT") {
            let rows = self
                .marker_rows
                .iter()
                .take(1)
                .map(|v| vec![JsonValue::String(v.clone())])
                .collect();
            Ok(Some(rows))
        } else if upper.starts_with("TRUNCATE") {
            self.marker_rows.clear();
            Ok(Some(Vec::new()))
        } else {
            let value = parse_inserted_literal(sql).ok_or_else(|| {
                DatabaseError::Query(format!("Cannot parse insert: {}", sql))
            })?;
            self.marker_rows.push(value);
            Ok(Some(Vec::new()))
        }
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            return Err(DatabaseError::Query(format!(
                "injected failure on '{}'",
                pattern
            )));
        }

        let rows = self.marker_statement(sql)?.unwrap_or_default();
        self.executed.push(sql.to_string());
        Ok(rows)
    }
}

/// Value of `... VALUES ('x')`, undoing `quote_literal`
fn parse_inserted_literal(sql: &str) -> Option<String> {
    let start = sql.find("('")? + 2;
    let end = sql.rfind("')")?;
    if end < start {
        return None;
    }

    let mut value = String::new();
    let mut chars = sql[start..end].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            value.push(chars.next()?);
        } else {
            value.push(c);
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::quote_literal;

    #[test]
    fn test_parse_inserted_literal() {
        let sql = format!("INSERT INTO t (version) VALUES ({})", quote_literal("it's a\\b"));
        assert_eq!(parse_inserted_literal(&sql).as_deref(), Some("it's a\\b"));
        assert_eq!(
            parse_inserted_literal("INSERT INTO t (version) VALUES ('')").as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_records_script_statements() {
        let mut conn = MemoryConnection::new();
        conn.execute("CREATE TABLE IF NOT EXISTS ch_migrations (version String) ENGINE = TinyLog")
            .await
            .unwrap();
        conn.execute("CREATE TABLE users (id UInt32) ENGINE = Memory")
            .await
            .unwrap();

        assert_eq!(conn.executed().len(), 2);
        assert_eq!(
            conn.script_statements(),
            vec!["CREATE TABLE users (id UInt32) ENGINE = Memory"]
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_not_recorded() {
        let mut conn = MemoryConnection::new();
        conn.fail_when("INVALID");

        assert!(conn.execute("INVALID SQL STATEMENT").await.is_err());
        assert!(conn.executed().is_empty());

        conn.clear_failures();
        assert!(conn.execute("INVALID SQL STATEMENT").await.is_ok());
    }
}
