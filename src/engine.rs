//! Process-wide database engine.
//!
//! The engine is created once at start-up and shared behind an `Arc`. It owns
//! an r2d2 pool of rusqlite connections; handing out sessions only needs
//! `&self`, so any number of request handlers can acquire concurrently.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r2d2::{ManageConnection, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::descriptor::{open_path, ConnectionDescriptor};
use crate::error::{Result, SessionError};
use crate::session::{Session, SessionCounters, SessionStats};
use crate::sqlite::Schema;

static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Shared connection-producing handle for one database.
pub struct Engine {
    descriptor: ConnectionDescriptor,
    pool: Pool<SqliteConnectionManager>,
    counters: Arc<SessionCounters>,
    next_session_id: AtomicU64,
    // An in-memory database disappears with its last connection; this one
    // keeps it alive for as long as the engine exists.
    _memory_anchor: Option<Mutex<Connection>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("descriptor", &self.descriptor)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build the engine described by `config`.
    ///
    /// One connection is opened up front, so an unreachable store is reported
    /// here rather than on the first request. Nothing is retried.
    #[instrument(skip(config), fields(uri = %config.uri))]
    pub fn connect(config: &DatabaseConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let descriptor = ConnectionDescriptor::parse(&config.uri)?;
        let manager = connection_manager(&descriptor);

        let first_conn = manager.connect().map_err(SessionError::Connect)?;
        let memory_anchor = descriptor.is_memory().then(|| Mutex::new(first_conn));

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connect_timeout)
            .build_unchecked(manager);

        info!(
            descriptor = %descriptor,
            pool_size = config.pool_size,
            "database engine ready"
        );

        Ok(Arc::new(Self {
            descriptor,
            pool,
            counters: Arc::new(SessionCounters::default()),
            next_session_id: AtomicU64::new(1),
            _memory_anchor: memory_anchor,
        }))
    }

    /// Build an engine for `uri` with default pool settings.
    pub fn from_uri(uri: &str) -> Result<Arc<Self>> {
        Self::connect(&DatabaseConfig::new(uri))
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// How long an acquisition waits for a free connection.
    pub fn connect_timeout(&self) -> Duration {
        self.pool.connection_timeout()
    }

    /// Acquisition and release counts since the engine was created.
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    /// Current pool occupancy.
    pub fn pool_state(&self) -> r2d2::State {
        self.pool.state()
    }

    /// Create every table and index in `schema` that does not exist yet.
    ///
    /// All DDL runs in a single transaction, so a failing statement leaves
    /// the database untouched.
    #[instrument(skip_all, fields(tables = schema.tables.len()))]
    pub fn initialize_schema(&self, schema: &Schema) -> Result<()> {
        let mut conn = self.checkout()?;
        let tx = conn.transaction()?;
        for statement in schema.to_sql() {
            debug!(%statement, "applying schema statement");
            tx.execute_batch(&statement)?;
        }
        tx.commit()?;
        info!("schema initialized");
        Ok(())
    }

    /// Check out a connection and open the session's deferred transaction.
    pub(crate) fn acquire(&self) -> Result<Session> {
        let conn = self.checkout()?;
        conn.execute_batch("BEGIN")?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Ok(Session::open(id, conn, Arc::clone(&self.counters)))
    }

    // A connection whose release-time rollback failed comes back from the
    // pool still inside a transaction.
    fn checkout(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        let conn = self.pool.get()?;
        if !conn.is_autocommit() {
            warn!("pooled connection returned mid-transaction, rolling back");
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(conn)
    }
}

fn connection_manager(descriptor: &ConnectionDescriptor) -> SqliteConnectionManager {
    match descriptor {
        // Shared-cache locks are per table and ignore busy_timeout. Readers
        // skip table locks entirely; writers wait on unlock_notify.
        ConnectionDescriptor::Memory => {
            let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
            SqliteConnectionManager::file(format!(
                "file:notification-db-{}-{seq}?mode=memory&cache=shared",
                std::process::id()
            ))
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA read_uncommitted = ON;")
            })
        }
        ConnectionDescriptor::File(path) => SqliteConnectionManager::file(open_path(path))
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                Ok(())
            }),
    }
}
