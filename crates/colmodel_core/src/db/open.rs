//! Connection bootstrap for the SQLite reference store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and apply catalog migrations before a
//!   connection is handed to a transport.
//! - Build transports from adapter options (`SqliteConnector`).
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have catalog migrations fully applied.

use super::migrations::apply_migrations;
use super::sqlite::SqliteTransport;
use super::{Connect, DbResult, Transport, TransportResult};
use crate::config::AdapterOptions;
use async_trait::async_trait;
use log::{debug, error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and applies all pending catalog migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    open_with("file", busy_timeout, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending catalog migrations.
pub fn open_db_in_memory(busy_timeout: Duration) -> DbResult<Connection> {
    open_with("memory", busy_timeout, Connection::open_in_memory)
}

fn open_with<F>(mode: &str, busy_timeout: Duration, opener: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}

/// Where a `SqliteConnector` keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    File(PathBuf),
}

/// Builds `SqliteTransport`s from adapter options.
///
/// `timeout_ms` becomes the SQLite busy timeout. Hosts and credentials have no
/// meaning for an embedded store and are ignored.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    target: SqliteTarget,
}

impl SqliteConnector {
    pub fn in_memory() -> Self {
        Self {
            target: SqliteTarget::Memory,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: SqliteTarget::File(path.into()),
        }
    }

    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }
}

#[async_trait]
impl Connect for SqliteConnector {
    async fn connect(&self, options: &AdapterOptions) -> TransportResult<Arc<dyn Transport>> {
        if !options.user.is_empty() {
            debug!("event=db_connect module=db status=ok note=credentials_ignored");
        }

        let target = self.target.clone();
        let busy_timeout = options.timeout();
        let conn = tokio::task::spawn_blocking(move || match target {
            SqliteTarget::Memory => open_db_in_memory(busy_timeout),
            SqliteTarget::File(path) => open_db(path, busy_timeout),
        })
        .await
        .map_err(|err| super::TransportError::connection(format!("spawn_blocking join error: {err}")))??;

        Ok(Arc::new(SqliteTransport::new(conn)))
    }
}
