//! # hermes-migrate: linked-chain migrations for ClickHouse
//!
//! Migration units live in directories named `<version>--<text>`, each with
//! an `info.toml` that points at the previous and next unit. This crate
//! rebuilds that chain, plans which units to run against the version marker
//! stored in the database, and executes their SQL one statement at a time.
//!
//! ```no_run
//! use hermes_migrate::{ClickHouseConnection, Migrator, Target};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = ClickHouseConnection::connect("clickhouse://localhost:8123/analytics")?;
//! let mut migrator = Migrator::new("versions");
//! let report = migrator.upgrade(&mut conn, &Target::Head).await?;
//! println!("applied {} migrations", report.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod chain;
pub mod error;
pub mod executor;
pub mod planner;
pub mod runner;
pub mod scaffold;
pub mod tracker;
pub mod unit;

// Re-export the main types
pub use backends::{ClickHouseConnection, DatabaseConnection, Row};
pub use chain::{Chain, ChainNode, NodeId};
pub use error::{DatabaseError, DbResult, MigrateResult, MigrationError};
pub use executor::{split_statements, ExecutionReport, Executor};
pub use planner::{check_target, plan, plan_downgrade, plan_upgrade, Plan, Target};
pub use runner::{MigrationStatus, Migrator, StatusEntry, UnitState};
pub use scaffold::create_migration;
pub use tracker::{VersionTracker, DEFAULT_TABLE};
pub use unit::{Direction, MigrationInfo, MigrationUnit};
