//! Leased database connections.
//!
//! A [`DbConnection`] is one session checked out of a pool, owned exclusively
//! by its holder until dropped (at which point sqlx returns it to the pool).
//! All statement execution follows the prepare-bind-execute pattern with the
//! statement handle scoped to the call; parameterless SQL is executed
//! unprepared, since some statements (transaction control, certain DDL) do
//! not support the prepared-statement protocol.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::DatabaseType;
use crate::db::row::{Row, row_from_optional, rows_from_all};
use crate::db::value::SqlValue;
use crate::error::{DbError, DbResult};
use sqlx::pool::PoolConnection;
use sqlx::{Executor as _, MySql, Postgres, Sqlite};
use tracing::debug;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy)]
pub struct ExecOutcome {
    /// Number of rows the statement affected.
    pub rows_affected: u64,
    /// Driver-generated key, when the backend produces one
    /// (MySQL `LAST_INSERT_ID`, SQLite `last_insert_rowid`).
    pub last_insert_id: Option<i64>,
}

/// A single database session leased from a [`DbPool`](crate::db::pool::DbPool).
pub enum DbConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl DbConnection {
    /// Get the database type for this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Execute a write statement and report the outcome.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        match self {
            DbConnection::MySql(conn) => {
                let result = if params.is_empty() {
                    (&mut **conn).execute(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_mysql_param(query, param);
                    }
                    query.execute(&mut **conn).await?
                };
                let id = result.last_insert_id();
                Ok(ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: (id != 0).then_some(id as i64),
                })
            }
            DbConnection::Postgres(conn) => {
                let result = if params.is_empty() {
                    (&mut **conn).execute(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_postgres_param(query, param);
                    }
                    query.execute(&mut **conn).await?
                };
                // PostgreSQL exposes generated keys only via RETURNING
                Ok(ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                })
            }
            DbConnection::SQLite(conn) => {
                let result = if params.is_empty() {
                    (&mut **conn).execute(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_sqlite_param(query, param);
                    }
                    query.execute(&mut **conn).await?
                };
                Ok(ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: (result.rows_affected() > 0)
                        .then_some(result.last_insert_rowid()),
                })
            }
        }
    }

    /// Fetch the first result row, converted to a [`Row`].
    /// A query with no result rows yields [`Row::empty`].
    pub async fn fetch_one_row(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Row> {
        debug!(sql = %sql, params = params.len(), "Fetching single row");
        match self {
            DbConnection::MySql(conn) => {
                let row = if params.is_empty() {
                    (&mut **conn).fetch_optional(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_mysql_param(query, param);
                    }
                    query.fetch_optional(&mut **conn).await?
                };
                Ok(row_from_optional(row))
            }
            DbConnection::Postgres(conn) => {
                let row = if params.is_empty() {
                    (&mut **conn).fetch_optional(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_postgres_param(query, param);
                    }
                    query.fetch_optional(&mut **conn).await?
                };
                Ok(row_from_optional(row))
            }
            DbConnection::SQLite(conn) => {
                let row = if params.is_empty() {
                    (&mut **conn).fetch_optional(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_sqlite_param(query, param);
                    }
                    query.fetch_optional(&mut **conn).await?
                };
                Ok(row_from_optional(row))
            }
        }
    }

    /// Fetch all result rows in result-set order.
    pub async fn fetch_rows(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Fetching rows");
        match self {
            DbConnection::MySql(conn) => {
                let rows = if params.is_empty() {
                    (&mut **conn).fetch_all(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_mysql_param(query, param);
                    }
                    query.fetch_all(&mut **conn).await?
                };
                Ok(rows_from_all(rows))
            }
            DbConnection::Postgres(conn) => {
                let rows = if params.is_empty() {
                    (&mut **conn).fetch_all(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_postgres_param(query, param);
                    }
                    query.fetch_all(&mut **conn).await?
                };
                Ok(rows_from_all(rows))
            }
            DbConnection::SQLite(conn) => {
                let rows = if params.is_empty() {
                    (&mut **conn).fetch_all(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_sqlite_param(query, param);
                    }
                    query.fetch_all(&mut **conn).await?
                };
                Ok(rows_from_all(rows))
            }
        }
    }

    /// Open a transaction on this session.
    pub async fn begin(&mut self) -> DbResult<()> {
        self.run_control("BEGIN").await
    }

    /// Commit the open transaction on this session.
    pub async fn commit(&mut self) -> DbResult<()> {
        self.run_control("COMMIT").await
    }

    /// Roll back the open transaction on this session.
    pub async fn rollback(&mut self) -> DbResult<()> {
        self.run_control("ROLLBACK").await
    }

    /// Run a transaction-control statement unprepared.
    async fn run_control(&mut self, sql: &str) -> DbResult<()> {
        debug!(sql = %sql, db_type = %self.db_type(), "Transaction control");
        match self {
            DbConnection::MySql(conn) => {
                (&mut **conn).execute(sql).await.map_err(DbError::from)?;
            }
            DbConnection::Postgres(conn) => {
                (&mut **conn).execute(sql).await.map_err(DbError::from)?;
            }
            DbConnection::SQLite(conn) => {
                (&mut **conn).execute(sql).await.map_err(DbError::from)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("db_type", &self.db_type())
            .finish_non_exhaustive()
    }
}
