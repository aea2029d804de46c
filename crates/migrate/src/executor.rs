//! Plan execution
//!
//! Runs the scripts of planned units one statement at a time and moves the
//! marker after every unit that completed. The first failure halts the run:
//! ClickHouse has no multi-statement transactions, so nothing is rolled back
//! and later units are never attempted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::backends::DatabaseConnection;
use crate::chain::{Chain, ChainNode};
use crate::error::{MigrateResult, MigrationError};
use crate::planner::Plan;
use crate::tracker::VersionTracker;
use crate::unit::{find_unit_dir, Direction};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub direction: Direction,
    /// Versions whose script ran and whose marker update succeeded, in order
    pub applied: Vec<String>,
    /// Marker value once the run finished; `None` is base
    pub marker: Option<String>,
    pub elapsed_ms: u128,
}

impl ExecutionReport {
    /// Report for a run with nothing to do
    pub fn noop(direction: Direction, marker: Option<&str>) -> Self {
        Self {
            direction,
            applied: Vec::new(),
            marker: marker.map(String::from),
            elapsed_ms: 0,
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Split a script into statements on `;`, dropping blank fragments
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Applies planned units against a connection
#[derive(Debug, Clone)]
pub struct Executor {
    migrations_dir: PathBuf,
    tracker: VersionTracker,
}

impl Executor {
    pub fn new(migrations_dir: impl Into<PathBuf>, tracker: VersionTracker) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            tracker,
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Run every node of `plan` in order, starting from marker `current`.
    pub async fn apply<C>(
        &self,
        conn: &mut C,
        chain: &Chain,
        plan: &Plan,
        current: Option<&str>,
    ) -> MigrateResult<ExecutionReport>
    where
        C: DatabaseConnection + ?Sized,
    {
        let started = Instant::now();
        let direction = plan.direction;
        let mut report = ExecutionReport::noop(direction, current);

        if plan.is_empty() {
            tracing::info!(mode = %direction, "no migration to run");
            return Ok(report);
        }

        tracing::info!(
            mode = %direction,
            versions_count = plan.len(),
            "Starting migration execution"
        );

        for id in &plan.nodes {
            let node = chain.node(*id);
            let marker = self.apply_node(conn, node, direction).await?;
            report.applied.push(node.version().to_string());
            report.marker = marker;
        }

        report.elapsed_ms = started.elapsed().as_millis();
        tracing::info!(
            mode = %direction,
            applied = report.applied_count(),
            elapsed_ms = report.elapsed_ms as u64,
            "Migration execution completed successfully"
        );
        Ok(report)
    }

    /// Run one unit and record it. Returns the marker now stored.
    async fn apply_node<C>(
        &self,
        conn: &mut C,
        node: &ChainNode,
        direction: Direction,
    ) -> MigrateResult<Option<String>>
    where
        C: DatabaseConnection + ?Sized,
    {
        let version = node.version();
        let dir = find_unit_dir(&self.migrations_dir, version)?
            .ok_or_else(|| MigrationError::DirectoryNotFound(version.to_string()))?;

        let statements = read_statements(&dir, version, direction)?;
        tracing::info!(
            version = %version,
            mode = %direction,
            statements = statements.len(),
            "Running migration"
        );

        let total = statements.len();
        for (i, statement) in statements.into_iter().enumerate() {
            let index = i + 1;
            tracing::debug!(version = %version, index, total, "executing statement");
            if let Err(source) = conn.execute(&statement).await {
                tracing::error!(
                    version = %version,
                    mode = %direction,
                    index,
                    total,
                    error = %source,
                    "SQL execution failed"
                );
                return Err(MigrationError::Statement {
                    version: version.to_string(),
                    index,
                    total,
                    statement,
                    source,
                });
            }
        }

        let marker = match direction {
            Direction::Upgrade => Some(version.to_string()),
            Direction::Downgrade => node.info().previous_version.clone(),
        };

        match self.tracker.write(conn, marker.as_deref()).await {
            Ok(()) => Ok(marker),
            Err(MigrationError::MarkerWrite { marker, source }) => {
                tracing::error!(
                    drift = true,
                    version = %version,
                    mode = %direction,
                    marker = %marker,
                    error = %source,
                    "Schema changes applied but the migration table was not updated; \
                     reconcile the marker manually before the next run"
                );
                Err(MigrationError::Drift {
                    version: version.to_string(),
                    direction,
                    marker,
                    source,
                })
            }
            Err(other) => Err(other),
        }
    }
}

/// Load and split the `direction` script of the unit in `dir`
fn read_statements(dir: &Path, version: &str, direction: Direction) -> MigrateResult<Vec<String>> {
    let path = dir.join(direction.file_name());

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(MigrationError::ScriptMissing {
                version: version.to_string(),
                direction,
                path,
            })
        }
        Err(source) => {
            return Err(MigrationError::ScriptUnreadable {
                version: version.to_string(),
                path,
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Err(MigrationError::ScriptEmpty {
            version: version.to_string(),
            direction,
            path,
        });
    }

    let statements = split_statements(&content);
    if statements.is_empty() {
        return Err(MigrationError::NoStatements {
            version: version.to_string(),
            direction,
            path,
        });
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryConnection;
    use crate::planner::{plan_downgrade, plan_upgrade, Target};
    use crate::unit::MigrationInfo;
    use tempfile::TempDir;

    fn write_unit(
        root: &Path,
        version: &str,
        previous: Option<&str>,
        next: Option<&str>,
        upgrade: &str,
        downgrade: &str,
    ) -> PathBuf {
        let dir = root.join(format!("{}--unit_{}", version, version));
        fs::create_dir_all(&dir).unwrap();
        MigrationInfo {
            message: format!("unit {}", version),
            version: version.to_string(),
            previous_version: previous.map(String::from),
            next_version: next.map(String::from),
            creation_date: "2024-01-01T00:00:00".to_string(),
        }
        .write_to(&dir)
        .unwrap();
        fs::write(dir.join("upgrade.sql"), upgrade).unwrap();
        fs::write(dir.join("downgrade.sql"), downgrade).unwrap();
        dir
    }

    fn setup(units: &[(&str, &str, &str)]) -> (TempDir, Chain) {
        let temp_dir = TempDir::new().unwrap();
        for (i, (version, up, down)) in units.iter().enumerate() {
            let previous = i.checked_sub(1).map(|p| units[p].0);
            let next = units.get(i + 1).map(|n| n.0);
            write_unit(temp_dir.path(), version, previous, next, up, down);
        }
        let mut chain = Chain::new(temp_dir.path());
        chain.build().unwrap();
        (temp_dir, chain)
    }

    async fn ready_conn() -> MemoryConnection {
        let mut conn = MemoryConnection::new();
        VersionTracker::default()
            .ensure_schema(&mut conn)
            .await
            .unwrap();
        conn
    }

    #[test]
    fn test_split_statements() {
        let sql = "CREATE TABLE a (x UInt8) ENGINE = Memory;\n\n  ;INSERT INTO a VALUES (1);  \n";
        assert_eq!(
            split_statements(sql),
            vec![
                "CREATE TABLE a (x UInt8) ENGINE = Memory".to_string(),
                "INSERT INTO a VALUES (1)".to_string(),
            ]
        );
        assert!(split_statements(" ; ;\n").is_empty());
        assert_eq!(split_statements("SELECT 1"), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test]
    async fn test_executes_every_statement_in_order() {
        let (temp_dir, chain) = setup(&[(
            "v1",
            "CREATE TABLE a (x UInt8) ENGINE = Memory; CREATE TABLE b (x UInt8) ENGINE = Memory; CREATE TABLE c (x UInt8) ENGINE = Memory;",
            "DROP TABLE c; DROP TABLE b; DROP TABLE a;",
        )]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = ready_conn().await;

        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();
        let report = executor.apply(&mut conn, &chain, &plan, None).await.unwrap();

        assert_eq!(
            conn.script_statements(),
            vec![
                "CREATE TABLE a (x UInt8) ENGINE = Memory",
                "CREATE TABLE b (x UInt8) ENGINE = Memory",
                "CREATE TABLE c (x UInt8) ENGINE = Memory",
            ]
        );
        assert_eq!(report.applied, vec!["v1".to_string()]);
        assert_eq!(report.marker.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_downgrade_marker_follows_previous_version() {
        let (temp_dir, chain) = setup(&[
            ("v1", "CREATE TABLE a (x UInt8) ENGINE = Memory", "DROP TABLE a"),
            ("v2", "CREATE TABLE b (x UInt8) ENGINE = Memory", "DROP TABLE b"),
        ]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = MemoryConnection::at_version("v2");

        let plan = plan_downgrade(&chain, Some("v2"), &Target::Version("v1".into())).unwrap();
        let report = executor.apply(&mut conn, &chain, &plan, Some("v2")).await.unwrap();
        assert_eq!(report.marker.as_deref(), Some("v1"));
        assert_eq!(conn.marker_rows().to_vec(), vec!["v1".to_string()]);

        let plan = plan_downgrade(&chain, Some("v1"), &Target::Base).unwrap();
        let report = executor.apply(&mut conn, &chain, &plan, Some("v1")).await.unwrap();
        assert_eq!(report.marker, None);
        assert_eq!(conn.marker_rows().to_vec(), vec![String::new()]);
        assert_eq!(conn.script_statements(), vec!["DROP TABLE b", "DROP TABLE a"]);
    }

    #[tokio::test]
    async fn test_statement_failure_halts_run() {
        let (temp_dir, chain) = setup(&[
            ("v1", "CREATE TABLE a (x UInt8) ENGINE = Memory", "DROP TABLE a"),
            ("v2", "CREATE TABLE b (x UInt8) ENGINE = Memory; BROKEN SQL; CREATE TABLE c (x UInt8) ENGINE = Memory", "DROP TABLE b"),
            ("v3", "CREATE TABLE d (x UInt8) ENGINE = Memory", "DROP TABLE d"),
        ]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = ready_conn().await;
        conn.fail_when("BROKEN");

        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();
        let result = executor.apply(&mut conn, &chain, &plan, None).await;

        match result {
            Err(MigrationError::Statement {
                version,
                index,
                total,
                ..
            }) => {
                assert_eq!(version, "v2");
                assert_eq!((index, total), (2, 3));
            }
            other => panic!("Expected statement failure, got {:?}", other),
        }
        // v1 recorded, nothing after the failing statement ran
        assert_eq!(conn.marker_rows().to_vec(), vec!["v1".to_string()]);
        assert_eq!(
            conn.script_statements(),
            vec![
                "CREATE TABLE a (x UInt8) ENGINE = Memory",
                "CREATE TABLE b (x UInt8) ENGINE = Memory",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_script_halts_before_any_statement() {
        let (temp_dir, chain) = setup(&[
            ("v1", "  \n\t", "DROP TABLE a"),
            ("v2", "CREATE TABLE b (x UInt8) ENGINE = Memory", "DROP TABLE b"),
        ]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = ready_conn().await;

        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();
        let result = executor.apply(&mut conn, &chain, &plan, None).await;

        assert!(matches!(result, Err(MigrationError::ScriptEmpty { ref version, .. }) if version == "v1"));
        assert!(conn.script_statements().is_empty());
        assert!(conn.marker_rows().is_empty());
    }

    #[tokio::test]
    async fn test_script_of_only_delimiters_has_no_statements() {
        let (temp_dir, chain) = setup(&[("v1", ";;\n;", "DROP TABLE a")]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = ready_conn().await;

        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();
        let result = executor.apply(&mut conn, &chain, &plan, None).await;
        assert!(matches!(result, Err(MigrationError::NoStatements { .. })));
    }

    #[tokio::test]
    async fn test_missing_script_and_directory() {
        let (temp_dir, chain) = setup(&[("v1", "SELECT 1", "SELECT 1")]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();

        let unit_dir = find_unit_dir(temp_dir.path(), "v1").unwrap().unwrap();
        fs::remove_file(unit_dir.join("upgrade.sql")).unwrap();
        let mut conn = ready_conn().await;
        let result = executor.apply(&mut conn, &chain, &plan, None).await;
        assert!(matches!(result, Err(MigrationError::ScriptMissing { .. })));

        fs::remove_dir_all(&unit_dir).unwrap();
        let result = executor.apply(&mut conn, &chain, &plan, None).await;
        assert!(matches!(result, Err(MigrationError::DirectoryNotFound(v)) if v == "v1"));
    }

    #[tokio::test]
    async fn test_marker_failure_is_drift() {
        let (temp_dir, chain) = setup(&[
            ("v1", "CREATE TABLE a (x UInt8) ENGINE = Memory", "DROP TABLE a"),
            ("v2", "CREATE TABLE b (x UInt8) ENGINE = Memory", "DROP TABLE b"),
        ]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = ready_conn().await;
        conn.fail_when("INSERT INTO ch_migrations");

        let plan = plan_upgrade(&chain, None, &Target::Head).unwrap();
        let err = executor
            .apply(&mut conn, &chain, &plan, None)
            .await
            .unwrap_err();

        assert!(err.is_drift());
        match err {
            MigrationError::Drift { version, marker, .. } => {
                assert_eq!(version, "v1");
                assert_eq!(marker, "v1");
            }
            other => panic!("Expected drift, got {:?}", other),
        }
        // The script ran, v2 was never attempted
        assert_eq!(
            conn.script_statements(),
            vec!["CREATE TABLE a (x UInt8) ENGINE = Memory"]
        );
    }

    #[tokio::test]
    async fn test_empty_plan_keeps_marker() {
        let (temp_dir, chain) = setup(&[("v1", "SELECT 1", "SELECT 1")]);
        let executor = Executor::new(temp_dir.path(), VersionTracker::default());
        let mut conn = MemoryConnection::at_version("v1");

        let plan = plan_upgrade(&chain, Some("v1"), &Target::Head).unwrap();
        let report = executor.apply(&mut conn, &chain, &plan, Some("v1")).await.unwrap();

        assert_eq!(report, ExecutionReport::noop(Direction::Upgrade, Some("v1")));
        assert!(conn.executed().is_empty());
    }
}
