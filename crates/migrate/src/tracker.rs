//! Version tracker
//!
//! Keeps the single "currently applied version" marker in a one-column
//! table of the target database. An empty table, or an empty value, means
//! base: no migration applied.

use crate::backends::{value_as_string, DatabaseConnection};
use crate::error::{MigrateResult, MigrationError};

/// Table holding the marker unless configured otherwise
pub const DEFAULT_TABLE: &str = "ch_migrations";

/// Reads and writes the applied-version marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTracker {
    table: String,
}

impl Default for VersionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl VersionTracker {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL to create the marker table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (version String) ENGINE = TinyLog",
            self.table
        )
    }

    /// SQL to read the marker
    pub fn select_version_sql(&self) -> String {
        format!("SELECT version FROM {} LIMIT 1", self.table)
    }

    /// SQL to clear the marker table. TinyLog tables cannot be updated in place.
    pub fn truncate_sql(&self) -> String {
        format!("TRUNCATE TABLE {}", self.table)
    }

    /// SQL to store `version` as the only row
    pub fn insert_version_sql(&self, version: &str) -> String {
        format!(
            "INSERT INTO {} (version) VALUES ({})",
            self.table,
            quote_literal(version)
        )
    }

    /// Create the marker table if it does not exist yet
    pub async fn ensure_schema<C>(&self, conn: &mut C) -> MigrateResult<()>
    where
        C: DatabaseConnection + ?Sized,
    {
        conn.execute(&self.create_table_sql())
            .await
            .map_err(MigrationError::SchemaEnsure)?;
        tracing::debug!(table = %self.table, "migration table ready");
        Ok(())
    }

    /// Current marker; `None` is base
    pub async fn read<C>(&self, conn: &mut C) -> MigrateResult<Option<String>>
    where
        C: DatabaseConnection + ?Sized,
    {
        let rows = conn
            .execute(&self.select_version_sql())
            .await
            .map_err(MigrationError::MarkerRead)?;

        let version = rows
            .first()
            .and_then(|row| row.first())
            .and_then(value_as_string)
            .filter(|v| !v.is_empty());

        tracing::debug!(version = ?version, "current migration version");
        Ok(version)
    }

    /// Replace the marker. `None` records base as an empty value.
    pub async fn write<C>(&self, conn: &mut C, version: Option<&str>) -> MigrateResult<()>
    where
        C: DatabaseConnection + ?Sized,
    {
        let marker = version.unwrap_or_default();
        let map_err = |source| MigrationError::MarkerWrite {
            marker: marker.to_string(),
            source,
        };

        conn.execute(&self.truncate_sql()).await.map_err(map_err)?;
        conn.execute(&self.insert_version_sql(marker))
            .await
            .map_err(map_err)?;

        tracing::info!(version = %marker, "Updated migration table");
        Ok(())
    }
}

/// Single-quoted ClickHouse string literal
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryConnection;

    #[test]
    fn test_sql_generation() {
        let tracker = VersionTracker::default();
        assert_eq!(
            tracker.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS ch_migrations (version String) ENGINE = TinyLog"
        );
        assert_eq!(tracker.truncate_sql(), "TRUNCATE TABLE ch_migrations");
        assert_eq!(
            tracker.insert_version_sql("abc"),
            "INSERT INTO ch_migrations (version) VALUES ('abc')"
        );
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it\\'s'");
        assert_eq!(quote_literal("a\\b"), "'a\\\\b'");
    }

    #[tokio::test]
    async fn test_empty_table_reads_as_base() {
        let tracker = VersionTracker::default();
        let mut conn = MemoryConnection::new();

        tracker.ensure_schema(&mut conn).await.unwrap();
        tracker.ensure_schema(&mut conn).await.unwrap();
        assert_eq!(tracker.read(&mut conn).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_replaces_marker() {
        let tracker = VersionTracker::default();
        let mut conn = MemoryConnection::new();
        tracker.ensure_schema(&mut conn).await.unwrap();

        tracker.write(&mut conn, Some("test_version_123")).await.unwrap();
        assert_eq!(
            tracker.read(&mut conn).await.unwrap().as_deref(),
            Some("test_version_123")
        );

        tracker.write(&mut conn, Some("test_version_456")).await.unwrap();
        assert_eq!(
            tracker.read(&mut conn).await.unwrap().as_deref(),
            Some("test_version_456")
        );
        assert_eq!(conn.marker_rows().to_vec(), vec!["test_version_456".to_string()]);

        tracker.write(&mut conn, None).await.unwrap();
        assert_eq!(tracker.read(&mut conn).await.unwrap(), None);
        assert_eq!(conn.marker_rows().to_vec(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_read_failure_is_distinct() {
        let tracker = VersionTracker::default();
        let mut conn = MemoryConnection::new();

        // table never created
        let result = tracker.read(&mut conn).await;
        assert!(matches!(result, Err(MigrationError::MarkerRead(_))));
    }

    #[tokio::test]
    async fn test_schema_failure() {
        let tracker = VersionTracker::default();
        let mut conn = MemoryConnection::new();
        conn.fail_when("CREATE TABLE IF NOT EXISTS");

        let result = tracker.ensure_schema(&mut conn).await;
        assert!(matches!(result, Err(MigrationError::SchemaEnsure(_))));
    }

    #[tokio::test]
    async fn test_write_failure_reports_marker() {
        let tracker = VersionTracker::default();
        let mut conn = MemoryConnection::new();
        tracker.ensure_schema(&mut conn).await.unwrap();
        conn.fail_when("INSERT INTO ch_migrations");

        match tracker.write(&mut conn, Some("v2")).await {
            Err(MigrationError::MarkerWrite { marker, .. }) => assert_eq!(marker, "v2"),
            other => panic!("Expected MarkerWrite error, got {:?}", other),
        }
    }
}
