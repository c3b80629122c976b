//! Typed persistence adapter for column-oriented storage.
//!
//! Model instances described by a `Schema` are flattened into typed columns,
//! written through an async `Transport`, and rebuilt from raw rows on read.
//! Attachments live in a side table keyed by `<model_key>:<name>`.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod db;
pub mod fault;
pub mod logging;
pub mod model;
pub mod schema;
pub mod types;

pub use adapter::{Adapter, AdapterError, AdapterResult, Listing};
pub use codec::{CodecError, SerializedModel};
pub use config::{AdapterOptions, ConfigError, LogConfig};
pub use db::{
    ColumnValue, Connect, Row, SqliteConnector, SqliteTransport, Statement, Transport,
    TransportError, TransportErrorKind, TransportResult,
};
pub use fault::{set_fault_handler, FaultHandler};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{Attachment, AttachmentBody, Model, ModelError, Value};
pub use schema::{Schema, SchemaBuilder, SchemaDescriptor, SchemaError};
pub use types::{LogicalType, TypeError, TypeRegistry};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
