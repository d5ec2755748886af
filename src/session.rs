//! Scoped database sessions.
//!
//! A [`Session`] is open from the moment it is acquired until it is released,
//! either explicitly through [`Session::close`] or implicitly when it goes out
//! of scope. Every session works inside a transaction opened on acquisition;
//! nothing it writes is kept unless it calls [`Session::commit`]. Release
//! happens exactly once: the open transaction is rolled back and the
//! connection goes back to the engine's pool.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ToSql};
use tracing::{debug, warn};

use crate::error::Result;
use crate::sqlite::{Row, SqlQuery, Value};

/// Acquisition and release counts for one engine.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of an engine's session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub acquired: u64,
    pub released: u64,
}

impl SessionStats {
    /// Sessions acquired but not yet released.
    pub fn open(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// One unit of work against the database, owned by a single scope.
///
/// `Session` is `Send` but not `Sync`: it may move to another thread or task,
/// but two scopes can never use it at the same time.
pub struct Session {
    id: u64,
    released: bool,
    counters: Arc<SessionCounters>,
    conn: PooledConnection<SqliteConnectionManager>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn open(
        id: u64,
        conn: PooledConnection<SqliteConnectionManager>,
        counters: Arc<SessionCounters>,
    ) -> Self {
        counters.acquired.fetch_add(1, Ordering::SeqCst);
        debug!(session = id, "session acquired");
        Self {
            id,
            released: false,
            counters,
            conn,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw rusqlite connection backing this session.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run a statement and return the number of changed rows.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize> {
        let named = query.params.named();
        let mut stmt = self.conn.prepare(&query.statement)?;
        Ok(stmt.execute(bind(&named).as_slice())?)
    }

    /// Run one or more semicolon-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Run a query and collect every row keyed by column name.
    pub fn query(&self, query: &SqlQuery) -> Result<Vec<Row>> {
        let named = query.params.named();
        let mut stmt = self.conn.prepare(&query.statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(bind(&named).as_slice())?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = HashMap::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), Value::from(row.get_ref(idx)?));
            }
            result.push(map);
        }
        Ok(result)
    }

    /// First row of `query`, if any.
    pub fn query_one(&self, query: &SqlQuery) -> Result<Option<Row>> {
        Ok(self.query(query)?.into_iter().next())
    }

    /// Make the work done so far permanent and start a new transaction.
    pub fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT; BEGIN")
    }

    /// Discard the work done so far and start a new transaction.
    pub fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK; BEGIN")
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Release the session now, reporting a failed rollback to the caller.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        let rolled_back = self.in_transaction();
        let outcome = if rolled_back {
            self.conn.execute_batch("ROLLBACK").map_err(Into::into)
        } else {
            Ok(())
        };
        debug!(session = self.id, rolled_back, "session released");
        outcome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(session = self.id, error = %err, "failed to release session cleanly");
        }
    }
}

fn bind<'a>(named: &'a [(String, &'a Value)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    named
        .iter()
        .map(|(name, value)| (name.as_str(), *value as &dyn ToSql))
        .collect()
}
