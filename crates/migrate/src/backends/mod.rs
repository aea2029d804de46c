//! Database backends
//!
//! The migration engine only needs to send one SQL statement at a time and
//! read back rows. `core` defines that contract, `clickhouse` implements it
//! over HTTP and `memory` keeps everything in process for tests.

pub mod clickhouse;
pub mod core;
pub mod memory;

pub use self::clickhouse::ClickHouseConnection;
pub use self::core::{value_as_string, DatabaseConnection, Row};
pub use self::memory::MemoryConnection;
