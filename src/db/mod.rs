//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Named connection pool registry with init-once semantics
//! - Per-call SQL executor with parameterized statements
//! - Transaction control over leased sessions
//! - Row conversion to an ordered column-name → value mapping

pub mod connection;
pub mod executor;
pub mod params;
pub mod pool;
pub mod registry;
pub mod row;
pub mod value;

pub use connection::{DbConnection, ExecOutcome};
pub use executor::SqlExecutor;
pub use pool::{DatabaseType, DbPool, PoolFactory, SqlxPoolFactory};
pub use registry::DatabaseRegistry;
pub use row::Row;
pub use value::SqlValue;
