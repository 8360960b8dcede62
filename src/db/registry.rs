//! Registry of named connection pools.
//!
//! The registry owns the logical-name → pool mapping for its lifetime. It is
//! an explicitly constructed instance meant to be shared by reference (or
//! `Arc`) with whatever needs database access; there is no process-global
//! state. Initialization happens at most once: the map is published through a
//! `OnceCell`, first-time callers are serialized by a mutex, and later `init`
//! calls log a warning and leave the stored mapping untouched. Reads after
//! initialization are lock-free.

use crate::config::{MASTER, RegistryConfig};
use crate::db::connection::DbConnection;
use crate::db::pool::{DbPool, PoolFactory, SqlxPoolFactory};
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

pub struct DatabaseRegistry {
    pools: OnceCell<HashMap<String, DbPool>>,
    init_lock: Mutex<()>,
}

impl DatabaseRegistry {
    /// Create an uninitialized registry.
    pub fn new() -> Self {
        Self {
            pools: OnceCell::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Initialize the registry, building one pool per configured database
    /// through the given factory.
    ///
    /// Idempotent: if the registry is already initialized, this logs a
    /// warning and returns `Ok(())` without touching the stored mapping;
    /// the first configuration wins. Concurrent first-time callers are
    /// serialized; exactly one performs the population. A factory error
    /// propagates and leaves the registry uninitialized.
    pub async fn init<F: PoolFactory>(&self, config: &RegistryConfig, factory: &F) -> DbResult<()> {
        let _guard = self.init_lock.lock().await;

        if self.pools.initialized() {
            warn!("Database registry already initialized; ignoring init call");
            return Ok(());
        }

        let pools = factory.create(config).await?;
        let names: Vec<&String> = pools.keys().collect();
        info!(databases = ?names, "Database registry initialized");

        self.pools
            .set(pools)
            .map_err(|_| DbError::internal("Registry initialized concurrently"))?;
        Ok(())
    }

    /// Initialize with the default sqlx pool factory.
    pub async fn init_default(&self, config: &RegistryConfig) -> DbResult<()> {
        self.init(config, &SqlxPoolFactory).await
    }

    /// Get the pool for a logical database name.
    ///
    /// Fails with [`DbError::UnknownDatabase`] for names absent from the
    /// mapping and [`DbError::NotInitialized`] before `init`, never with a
    /// null-like value.
    pub fn pool(&self, name: &str) -> DbResult<&DbPool> {
        let pools = self.pools.get().ok_or(DbError::NotInitialized)?;
        pools
            .get(name)
            .ok_or_else(|| DbError::unknown_database(name))
    }

    /// Get the pool for the default database name, "master".
    pub fn master(&self) -> DbResult<&DbPool> {
        self.pool(MASTER)
    }

    /// Lease a connection for a logical database with the given auto-commit
    /// mode. With `auto_commit = false` the session starts inside an open
    /// transaction. Infrastructure errors (pool exhaustion, connectivity
    /// loss) propagate to the caller.
    pub async fn acquire(&self, name: &str, auto_commit: bool) -> DbResult<DbConnection> {
        let pool = self.pool(name)?;
        let mut conn = pool.acquire().await?;
        if !auto_commit {
            conn.begin().await?;
        }
        Ok(conn)
    }

    /// Lease a connection in auto-commit mode.
    pub async fn acquire_default(&self, name: &str) -> DbResult<DbConnection> {
        self.acquire(name, true).await
    }

    /// Lease a connection to the default database, "master", in auto-commit
    /// mode.
    pub async fn acquire_master(&self) -> DbResult<DbConnection> {
        self.acquire(MASTER, true).await
    }

    /// Whether `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.pools.initialized()
    }

    /// Configured logical names (empty before initialization).
    pub fn database_names(&self) -> Vec<&str> {
        self.pools
            .get()
            .map(|pools| pools.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Close every pool. Leased connections drain as they are returned.
    pub async fn close_all(&self) {
        if let Some(pools) = self.pools.get() {
            for (name, pool) in pools {
                info!(name = %name, "Closing connection pool");
                pool.close().await;
            }
        }
    }
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("initialized", &self.is_initialized())
            .field("databases", &self.database_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_lookup_fails() {
        let registry = DatabaseRegistry::new();
        assert!(!registry.is_initialized());
        assert!(matches!(registry.pool("master"), Err(DbError::NotInitialized)));
        assert!(matches!(registry.master(), Err(DbError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_unknown_name_after_init() {
        let registry = DatabaseRegistry::new();
        let config = RegistryConfig::from_specs(&["sqlite::memory:"]).unwrap();
        registry.init_default(&config).await.unwrap();

        match registry.pool("reporting") {
            Err(DbError::UnknownDatabase { name }) => assert_eq!(name, "reporting"),
            other => panic!("expected UnknownDatabase, got {:?}", other.map(|_| ())),
        }
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let registry = DatabaseRegistry::new();
        let first = RegistryConfig::from_specs(&["sqlite::memory:"]).unwrap();
        let second =
            RegistryConfig::from_specs(&["sqlite::memory:", "extra=sqlite::memory:"]).unwrap();

        registry.init_default(&first).await.unwrap();
        registry.init_default(&second).await.unwrap();

        // First configuration stays in effect
        let mut names = registry.database_names();
        names.sort_unstable();
        assert_eq!(names, vec![MASTER]);
        registry.close_all().await;
    }
}
