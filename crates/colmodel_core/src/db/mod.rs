//! Storage transport contract and the SQLite reference transport.
//!
//! # Responsibility
//! - Define the narrow async contract the adapter uses to reach the storage
//!   engine (`Transport`) and to build one from options (`Connect`).
//! - Define storage-native column values and structured statements.
//! - Provide `SqliteTransport`, a column-store emulation over SQLite.
//!
//! # Invariants
//! - Every operation is asynchronous; blocking engine work never runs on the
//!   caller's task.
//! - A transport reports failures through its result; connection-level
//!   failures are additionally pushed to the installed failure observer.

use crate::config::AdapterOptions;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub mod migrations;
mod open;
mod sqlite;
pub mod statement;

pub use open::{open_db, open_db_in_memory, SqliteConnector, SqliteTarget};
pub use sqlite::SqliteTransport;
pub use statement::{Assignment, BoundValue, ColumnDef, Filter, Statement};

/// Storage-native value of one column.
///
/// `Set` and `List` are distinct so a bound collection is encoded with the
/// right collection kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Text(String),
    Double(f64),
    Boolean(bool),
    /// Epoch milliseconds.
    Timestamp(i64),
    Uuid(Uuid),
    List(Vec<ColumnValue>),
    Set(Vec<ColumnValue>),
    Map(BTreeMap<String, ColumnValue>),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One raw row: column name to storage value.
pub type Row = BTreeMap<String, ColumnValue>;

pub type TransportResult<T> = Result<T, TransportError>;

/// Observer notified of connection-level transport failures.
pub type FailureObserver = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Failure class reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection, pool or runtime failure; the transport may be unusable.
    Connection,
    /// The engine rejected the statement.
    Query,
    /// A bound or stored value does not fit its column.
    InvalidData,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Query => "query",
            Self::InvalidData => "invalid_data",
        }
    }
}

/// Error returned by a transport; `why` is the engine's own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub why: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, why: impl Into<String>) -> Self {
        Self {
            kind,
            why: why.into(),
        }
    }

    pub fn connection(why: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, why)
    }

    pub fn query(why: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Query, why)
    }

    pub fn invalid_data(why: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidData, why)
    }

    pub fn why(&self) -> &str {
        &self.why
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.why)
    }
}

impl Error for TransportError {}

/// Errors from opening and bootstrapping the SQLite reference store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "catalog schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for TransportError {
    fn from(value: DbError) -> Self {
        Self::connection(value.to_string())
    }
}

impl From<rusqlite::Error> for TransportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::query(value.to_string())
    }
}

/// Async request channel to the storage engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one statement. Writes and DDL return no rows.
    async fn execute(&self, statement: &Statement) -> TransportResult<Vec<Row>>;

    /// Installs the observer for connection-level failures, replacing any
    /// previous one.
    fn set_failure_observer(&self, observer: FailureObserver);

    fn has_failure_observer(&self) -> bool;
}

/// Builds a transport from adapter options.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, options: &AdapterOptions) -> TransportResult<Arc<dyn Transport>>;
}
