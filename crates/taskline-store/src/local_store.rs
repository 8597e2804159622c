//! The local store handle.
//!
//! [`LocalStore`] is constructed explicitly and shared by `Arc` with the
//! repository and sync engine. It starts closed: every operation except
//! [`LocalStore::init`], [`LocalStore::close`] and [`LocalStore::is_open`]
//! returns [`StoreError::NotInitialized`] until `init` succeeds.
//!
//! Statements issued through [`LocalStore::execute`] / the query methods each
//! run on whichever pooled connection is free; use [`LocalStore::transaction`]
//! when several statements must be atomic.

use std::path::Path;

use parking_lot::RwLock;
use rusqlite::{Connection, OptionalExtension, Params, Row};
use tracing::{debug, info, warn};

use crate::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};

/// Name that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Result of a single write statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows changed by the statement.
    pub rows_affected: usize,
    /// Row id assigned by an `INSERT` that changed a row.
    pub last_insert_rowid: Option<i64>,
}

#[derive(Debug)]
struct OpenState {
    name: String,
    pool: ConnectionPool,
}

/// Persistent relational store.
#[derive(Debug)]
pub struct LocalStore {
    config: ConnectionConfig,
    state: RwLock<Option<OpenState>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

impl LocalStore {
    /// Create a closed store that will open pools with `config`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// Create a store and immediately [`init`](Self::init) it.
    pub fn open(name: &str, config: ConnectionConfig) -> Result<Self> {
        let store = Self::new(config);
        store.init(name)?;
        Ok(store)
    }

    /// Open or create the database called `name` (a file path, or
    /// [`IN_MEMORY`]).
    ///
    /// Calling `init` again with the same name keeps the existing pool. A
    /// different name closes the current database first.
    pub fn init(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if let Some(open) = state.as_ref() {
            if open.name == name {
                debug!(name, "local store already open, reusing");
                return Ok(());
            }
            info!(from = %open.name, to = name, "reopening local store");
        }

        let pool = if name == IN_MEMORY {
            connection::new_in_memory(&self.config)?
        } else {
            connection::new_file(Path::new(name), &self.config)?
        };

        *state = Some(OpenState {
            name: name.to_string(),
            pool,
        });
        info!(name, "local store opened");
        Ok(())
    }

    /// Release the database. Safe to call when already closed or never opened.
    pub fn close(&self) {
        if let Some(open) = self.state.write().take() {
            info!(name = %open.name, "local store closed");
        }
    }

    /// Whether `init` has succeeded and `close` has not been called since.
    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    /// Name passed to the last successful `init`, if still open.
    pub fn name(&self) -> Option<String> {
        self.state.read().as_ref().map(|open| open.name.clone())
    }

    fn conn(&self) -> Result<PooledConnection> {
        // Clone the pool handle so the lock is not held while waiting for a connection.
        let pool = self
            .state
            .read()
            .as_ref()
            .map(|open| open.pool.clone())
            .ok_or(StoreError::NotInitialized)?;
        Ok(pool.get()?)
    }

    /// Run one write statement.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecOutcome> {
        let conn = self.conn()?;
        execute_on(&conn, sql, params)
    }

    /// Run one or more parameterless statements separated by `;`.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Return the first row mapped by `map`, or `None` when there is no row.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        query_one_on(&conn, sql, params, map)
    }

    /// Return every row mapped by `map`, in result order.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        query_all_on(&conn, sql, params, map)
    }

    /// Run `body` as one atomic unit.
    ///
    /// Commits when `body` returns `Ok`. Any error from `body` or from the
    /// commit rolls back every statement of the transaction, then comes back
    /// wrapped in [`StoreError::TransactionFailure`].
    pub fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::TransactionFailure(Box::new(e.into())))?;

        let outcome = {
            let handle = StoreTx { conn: &tx };
            body(&handle)
        };

        match outcome {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| StoreError::TransactionFailure(Box::new(e.into())))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "explicit rollback failed; connection drop rolls back");
                }
                debug!(error = %err, "transaction rolled back");
                Err(StoreError::TransactionFailure(Box::new(err)))
            }
        }
    }
}

/// Statement surface available inside [`LocalStore::transaction`].
pub struct StoreTx<'a> {
    conn: &'a Connection,
}

impl StoreTx<'_> {
    /// Run one write statement inside the transaction.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecOutcome> {
        execute_on(self.conn, sql, params)
    }

    /// Run parameterless statements inside the transaction.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// First row inside the transaction, or `None`.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        query_one_on(self.conn, sql, params, map)
    }

    /// Every row inside the transaction.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        query_all_on(self.conn, sql, params, map)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal
// ─────────────────────────────────────────────────────────────────────────────

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

fn execute_on<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<ExecOutcome> {
    let rows_affected = conn.execute(sql, params)?;
    let last_insert_rowid = (rows_affected > 0 && is_insert(sql)).then(|| conn.last_insert_rowid());
    Ok(ExecOutcome {
        rows_affected,
        last_insert_rowid,
    })
}

fn query_one_on<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    Ok(conn.query_row(sql, params, map).optional()?)
}

fn query_all_on<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
