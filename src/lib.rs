//! Database access toolkit: named connection pools and a per-call SQL
//! executor over SQLite, PostgreSQL, and MySQL.
//!
//! The crate has two layers. A [`DatabaseRegistry`] holds one connection
//! pool per logical database name, built once from a [`RegistryConfig`].
//! A [`SqlExecutor`] leases a session from the registry and runs
//! parameterized statements against it, returning results as ordered
//! [`Row`] mappings.
//!
//! ```no_run
//! use dbkit::{DatabaseRegistry, RegistryConfig, SqlExecutor, SqlValue};
//!
//! # async fn demo() -> dbkit::DbResult<()> {
//! let config = RegistryConfig::from_specs(&["sqlite:app.db"])?;
//! let registry = DatabaseRegistry::new();
//! registry.init_default(&config).await?;
//!
//! let mut exec = SqlExecutor::connect(&registry, "master").await?;
//! let row = exec
//!     .select("SELECT name FROM users WHERE id = ?", &[SqlValue::from(1)])
//!     .await?;
//! if let Some(name) = row.get("name") {
//!     println!("{:?}", name);
//! }
//! exec.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;

pub use config::{DatabaseConfig, MASTER, PoolOptions, RegistryConfig};
pub use db::{
    DatabaseRegistry, DatabaseType, DbConnection, DbPool, ExecOutcome, PoolFactory, Row,
    SqlExecutor, SqlValue, SqlxPoolFactory,
};
pub use error::{DbError, DbResult};
