//! Per-call SQL executor.
//!
//! A [`SqlExecutor`] wraps one leased connection and exposes the operation
//! vocabulary callers work with: `select`, `select_list`, `insert`, `update`,
//! `delete`, plus transaction control. Each executor is a short-lived,
//! single-owner object: create one for the unit of work, run statements
//! through it, then `close` it to release the session back to the pool.
//!
//! Error handling is strictly per-call. A failed statement returns `Err` for
//! that call only; the executor and its session remain usable for the next
//! statement.

use crate::db::connection::DbConnection;
use crate::db::pool::DatabaseType;
use crate::db::registry::DatabaseRegistry;
use crate::db::row::Row;
use crate::db::value::SqlValue;
use crate::error::{DbError, DbResult};
use tracing::{debug, warn};

pub struct SqlExecutor {
    conn: Option<DbConnection>,
    in_transaction: bool,
    database: String,
}

impl SqlExecutor {
    /// Lease a connection to the named logical database in auto-commit mode.
    pub async fn connect(registry: &DatabaseRegistry, database: &str) -> DbResult<Self> {
        Self::connect_with(registry, database, true).await
    }

    /// Lease a connection with an explicit auto-commit mode. With
    /// `auto_commit = false` the session starts inside an open transaction.
    pub async fn connect_with(
        registry: &DatabaseRegistry,
        database: &str,
        auto_commit: bool,
    ) -> DbResult<Self> {
        let conn = registry.acquire(database, auto_commit).await?;
        debug!(database = %database, auto_commit, "Executor session opened");
        Ok(Self {
            conn: Some(conn),
            in_transaction: !auto_commit,
            database: database.to_string(),
        })
    }

    /// Logical database this executor is bound to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Backend type of the underlying session.
    pub fn database_type(&self) -> DbResult<DatabaseType> {
        Ok(self.conn_ref()?.db_type())
    }

    /// Whether statements commit individually (no transaction open).
    pub fn auto_commit(&self) -> bool {
        !self.in_transaction
    }

    /// Run a query expected to produce at most one row.
    ///
    /// Returns the first result row; a query matching nothing returns
    /// `Ok(Row::empty())`, which callers distinguish from a populated row
    /// via [`Row::is_empty`].
    pub async fn select(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Row> {
        self.conn_mut()?.fetch_one_row(sql, params).await
    }

    /// Run a query and collect every result row, in result-set order.
    /// A query matching nothing returns an empty vector.
    pub async fn select_list(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        self.conn_mut()?.fetch_rows(sql, params).await
    }

    /// Run an INSERT statement.
    ///
    /// Returns the database-generated key when the backend produces one,
    /// otherwise the number of rows inserted. PostgreSQL reports generated
    /// keys only through `RETURNING`, so plain inserts there yield the row
    /// count; use [`select`](Self::select) with a `RETURNING` clause to read
    /// the key.
    pub async fn insert(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<i64> {
        let outcome = self.conn_mut()?.execute(sql, params).await?;
        match outcome.last_insert_id {
            Some(id) if outcome.rows_affected > 0 => Ok(id),
            _ => Ok(outcome.rows_affected as i64),
        }
    }

    /// Run an UPDATE statement and return the number of rows affected.
    /// Zero is a successful outcome, not an error.
    pub async fn update(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        Ok(self.conn_mut()?.execute(sql, params).await?.rows_affected)
    }

    /// Run a DELETE statement and return the number of rows affected.
    pub async fn delete(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        self.update(sql, params).await
    }

    /// Open a transaction on this session. Subsequent statements become
    /// part of it until [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback). A no-op if a transaction is already
    /// open.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        if self.in_transaction {
            debug!(database = %self.database, "Transaction already open");
            return Ok(());
        }
        self.conn_mut()?.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction. The session returns to auto-commit mode.
    /// A no-op in auto-commit mode, where there is nothing to commit.
    pub async fn commit(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn_mut()?.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction. The session returns to auto-commit
    /// mode. A no-op in auto-commit mode, where every statement has already
    /// committed.
    pub async fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn_mut()?.rollback().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Switch the auto-commit mode of this session.
    ///
    /// Turning auto-commit off opens a transaction; turning it back on
    /// commits any open transaction first, so no work is silently lost.
    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        if auto_commit {
            self.commit().await
        } else {
            self.begin_transaction().await
        }
    }

    /// Release the session back to its pool, rolling back any open
    /// transaction first.
    pub async fn close(mut self) -> DbResult<()> {
        if self.in_transaction {
            warn!(database = %self.database, "Closing executor with open transaction; rolling back");
            self.conn_mut()?.rollback().await?;
            self.in_transaction = false;
        }
        // Dropping the connection returns it to the pool
        self.conn.take();
        Ok(())
    }

    fn conn_mut(&mut self) -> DbResult<&mut DbConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::internal("Executor session already released"))
    }

    fn conn_ref(&self) -> DbResult<&DbConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbError::internal("Executor session already released"))
    }
}

impl Drop for SqlExecutor {
    /// Safety net for executors dropped without `close`: an open transaction
    /// must not leak back into the pool, so the rollback is finished on a
    /// spawned task before the connection is released.
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Some(mut conn) = self.conn.take() {
            warn!(database = %self.database, "Executor dropped with open transaction; rolling back");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = conn.rollback().await {
                        warn!(error = %e, "Rollback on drop failed");
                    }
                });
            }
        }
    }
}

impl std::fmt::Debug for SqlExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlExecutor")
            .field("database", &self.database)
            .field("in_transaction", &self.in_transaction)
            .field("released", &self.conn.is_none())
            .finish()
    }
}
