//! Migrator
//!
//! Drives one command invocation: build the chain once, make sure the marker
//! table exists, read the marker, plan, then execute.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::backends::DatabaseConnection;
use crate::chain::Chain;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ExecutionReport, Executor};
use crate::planner::{check_target, plan, Target};
use crate::tracker::VersionTracker;
use crate::unit::Direction;

/// Position of a unit relative to the marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Applied,
    Current,
    Pending,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitState::Applied => "applied",
            UnitState::Current => "current",
            UnitState::Pending => "pending",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub version: String,
    pub message: String,
    pub state: UnitState,
}

/// Snapshot of the chain against the recorded marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current: Option<String>,
    pub entries: Vec<StatusEntry>,
    pub broken_link: Option<String>,
    pub orphans: Vec<String>,
}

impl MigrationStatus {
    /// Whether the marker names a unit of the chain (base always does)
    pub fn current_in_chain(&self) -> bool {
        match &self.current {
            None => true,
            Some(version) => self.entries.iter().any(|e| &e.version == version),
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == UnitState::Pending)
    }
}

/// Entry point for running migrations in one directory
#[derive(Debug)]
pub struct Migrator {
    chain: Chain,
    tracker: VersionTracker,
    executor: Executor,
}

impl Migrator {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self::with_tracker(migrations_dir, VersionTracker::default())
    }

    pub fn with_tracker(migrations_dir: impl Into<PathBuf>, tracker: VersionTracker) -> Self {
        let migrations_dir = migrations_dir.into();
        Self {
            chain: Chain::new(migrations_dir.clone()),
            executor: Executor::new(migrations_dir, tracker.clone()),
            tracker,
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        self.chain.migrations_dir()
    }

    /// The chain, built on first use
    pub fn chain(&mut self) -> MigrateResult<&Chain> {
        self.chain.build()
    }

    /// Ensure the marker table and read the current marker.
    ///
    /// A read failure is returned as is: running on an unknown state is never
    /// attempted.
    pub async fn prepare<C>(&self, conn: &mut C) -> MigrateResult<Option<String>>
    where
        C: DatabaseConnection + ?Sized,
    {
        self.tracker.ensure_schema(conn).await?;
        let current = self.tracker.read(conn).await?;
        tracing::info!(current_version = ?current, "current migration version");
        Ok(current)
    }

    pub async fn upgrade<C>(&mut self, conn: &mut C, target: &Target) -> MigrateResult<ExecutionReport>
    where
        C: DatabaseConnection + ?Sized,
    {
        self.run(conn, target, Direction::Upgrade).await
    }

    pub async fn downgrade<C>(
        &mut self,
        conn: &mut C,
        target: &Target,
    ) -> MigrateResult<ExecutionReport>
    where
        C: DatabaseConnection + ?Sized,
    {
        self.run(conn, target, Direction::Downgrade).await
    }

    async fn run<C>(
        &mut self,
        conn: &mut C,
        target: &Target,
        direction: Direction,
    ) -> MigrateResult<ExecutionReport>
    where
        C: DatabaseConnection + ?Sized,
    {
        tracing::info!(mode = %direction, revision = %target, "{}", direction);

        self.chain.build()?;
        if let Some(missing) = self.chain.broken_link() {
            return Err(MigrationError::BrokenChain {
                missing: missing.to_string(),
            });
        }

        check_target(&self.chain, target, direction)?;

        let current = self.prepare(conn).await?;
        let plan = plan(&self.chain, current.as_deref(), target, direction)?;
        self.executor
            .apply(conn, &self.chain, &plan, current.as_deref())
            .await
    }

    /// Current marker and the state of every unit
    pub async fn status<C>(&mut self, conn: &mut C) -> MigrateResult<MigrationStatus>
    where
        C: DatabaseConnection + ?Sized,
    {
        self.chain.build()?;
        let current = self.prepare(conn).await?;

        let current_index = current
            .as_deref()
            .and_then(|v| self.chain.iter().position(|n| n.version() == v));

        let entries = self
            .chain
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let state = match current_index {
                    Some(c) if i < c => UnitState::Applied,
                    Some(c) if i == c => UnitState::Current,
                    _ => UnitState::Pending,
                };
                StatusEntry {
                    version: node.version().to_string(),
                    message: node.info().message.clone(),
                    state,
                }
            })
            .collect();

        Ok(MigrationStatus {
            current,
            entries,
            broken_link: self.chain.broken_link().map(String::from),
            orphans: self.chain.orphans().to_vec(),
        })
    }
}
