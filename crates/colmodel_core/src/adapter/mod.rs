//! Typed persistence adapter over a column-store transport.
//!
//! # Responsibility
//! - Bind one schema to one transport and keyspace.
//! - Provision keyspace, row table and attachment side table.
//! - Save, merge, read, list and delete model instances.
//!
//! # Invariants
//! - Caller errors are raised before any transport call.
//! - Transport failures reach the caller unchanged, except "already exists"
//!   failures during provisioning, which count as success.
//! - The row write and the attachment writes of one save are not atomic with
//!   each other; a failure between them can leave stale attachments.
//! - Batch fan-outs fail as a whole when any member fails.

use crate::codec::{encode_key, encode_value, inflate_row, serialize_model};
use crate::config::AdapterOptions;
use crate::db::{
    Assignment, BoundValue, ColumnDef, Connect, Filter, Row, Statement, Transport,
};
use crate::fault::failure_observer;
use crate::model::{Model, ModelError, Value};
use crate::schema::{Schema, SchemaDescriptor};
use crate::types::{column_type_for, ColumnType};
use futures::future::try_join_all;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;

mod attachments;
mod error;

pub use attachments::{ATTACHMENT_KEY_COLUMN, ATTACHMENT_TABLE_COLUMNS};
pub use error::{AdapterError, AdapterResult};

const REPLICATION_FACTOR: u32 = 1;

static ALREADY_EXISTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^cannot add already existing").expect("valid already-exists regex")
});

/// Result of `Adapter::all`.
#[derive(Debug, Clone)]
pub struct Listing {
    pub models: Vec<Model>,
    /// Every row of the table was materialized.
    pub fully_materialized: bool,
}

/// Persistence adapter for one model type.
pub struct Adapter {
    options: AdapterOptions,
    schema: Arc<Schema>,
    transport: Arc<dyn Transport>,
    table: String,
    attachment_table: String,
}

impl Adapter {
    /// Builds a transport through `connector` and attaches a failure observer
    /// that logs and forwards to the process fault handler.
    pub async fn configure(
        options: AdapterOptions,
        schema: Arc<Schema>,
        connector: &dyn Connect,
    ) -> AdapterResult<Self> {
        let started_at = Instant::now();
        let transport = match connector.connect(&options).await {
            Ok(transport) => transport,
            Err(err) => {
                warn!(
                    "event=adapter_configure module=adapter status=error keyspace={} error_kind={} duration_ms={}",
                    options.keyspace,
                    err.kind.as_str(),
                    started_at.elapsed().as_millis()
                );
                return Err(err.into());
            }
        };
        transport.set_failure_observer(failure_observer(&options.keyspace));

        info!(
            "event=adapter_configure module=adapter status=ok keyspace={} table={} transport=owned duration_ms={}",
            options.keyspace,
            schema.plural(),
            started_at.elapsed().as_millis()
        );
        Ok(Self::bind(options, schema, transport))
    }

    /// Adopts a caller-supplied transport; its failure handling stays with
    /// the caller.
    pub fn configure_with_transport(
        options: AdapterOptions,
        schema: Arc<Schema>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        info!(
            "event=adapter_configure module=adapter status=ok keyspace={} table={} transport=adopted",
            options.keyspace,
            schema.plural()
        );
        Self::bind(options, schema, transport)
    }

    fn bind(options: AdapterOptions, schema: Arc<Schema>, transport: Arc<dyn Transport>) -> Self {
        let table = schema.plural().to_string();
        let attachment_table = schema.attachment_table();
        Self {
            options,
            schema,
            transport,
            table,
            attachment_table,
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn keyspace(&self) -> &str {
        &self.options.keyspace
    }

    /// Ensures keyspace, row table and (when attachments are declared) the
    /// attachment table exist. Safe to run repeatedly.
    pub async fn provision(&self) -> AdapterResult<()> {
        let started_at = Instant::now();
        let keyspace = self.keyspace().to_string();

        self.execute_ddl(Statement::CreateKeyspace {
            keyspace: keyspace.clone(),
            replication_factor: REPLICATION_FACTOR,
        })
        .await?;

        let columns = self
            .schema
            .property_types()
            .into_iter()
            .map(|(name, logical_type)| ColumnDef::new(name, column_type_for(logical_type)))
            .collect();
        self.execute_ddl(Statement::CreateTable {
            keyspace: keyspace.clone(),
            table: self.table.clone(),
            columns,
            primary_key: self.schema.key_field().to_string(),
        })
        .await?;

        if self.schema.has_attachments() {
            let columns = ATTACHMENT_TABLE_COLUMNS
                .iter()
                .map(|name| ColumnDef::new(*name, ColumnType::TEXT))
                .collect();
            self.execute_ddl(Statement::CreateTable {
                keyspace,
                table: self.attachment_table.clone(),
                columns,
                primary_key: ATTACHMENT_KEY_COLUMN.to_string(),
            })
            .await?;
        }

        info!(
            "event=adapter_provision module=adapter status=ok keyspace={} table={} duration_ms={}",
            self.keyspace(),
            self.table,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Writes every column of `model` plus its pending attachments, then
    /// marks it clean.
    ///
    /// Empty sets and maps are left out of the insert. On an instance already
    /// persisted, those columns are then cleared with one null update so a
    /// stored collection cannot survive being emptied.
    ///
    /// # Errors
    /// - `MissingKey` when the key is unset; nothing is sent.
    pub async fn save(&self, model: &mut Model) -> AdapterResult<()> {
        let key = model.key().ok_or(AdapterError::MissingKey { operation: "save" })?;
        let serialized = serialize_model(model)?;

        self.execute(Statement::Insert {
            keyspace: self.keyspace().to_string(),
            table: self.table.clone(),
            values: serialized.columns,
        })
        .await?;
        if model.is_persisted() && !serialized.elided.is_empty() {
            self.clear_columns(&key, &serialized.elided).await?;
        }
        self.save_attachments(&key, &serialized.attachments).await?;

        model.take_pending_attachments();
        model.mark_clean();
        model.mark_persisted();
        Ok(())
    }

    /// Same as `save`.
    pub async fn update(&self, model: &mut Model) -> AdapterResult<()> {
        self.save(model).await
    }

    /// Applies a partial column update without reading the row.
    ///
    /// Values are validated and encoded per property type. An empty set or
    /// map clears its column.
    pub async fn merge<I, K>(&self, key: &str, partial: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let key_field = self.schema.key_field();
        let mut assignments = Vec::new();
        for (name, value) in partial {
            let name = name.as_ref();
            if name == key_field {
                return Err(AdapterError::KeyInMerge(name.to_string()));
            }
            let logical_type = self
                .schema
                .property_type(name)
                .ok_or_else(|| ModelError::UnknownProperty(name.to_string()))?;
            if !self.schema.registry().validate(logical_type, &value) {
                return Err(ModelError::InvalidValue {
                    property: name.to_string(),
                    logical_type: logical_type.name(),
                }
                .into());
            }
            assignments.push(Assignment::new(name, encode_value(name, logical_type, &value)?));
        }

        if assignments.is_empty() {
            return Ok(());
        }

        self.execute(Statement::Update {
            keyspace: self.keyspace().to_string(),
            table: self.table.clone(),
            assignments,
            filter: self.key_filter(key)?,
        })
        .await?;
        Ok(())
    }

    async fn clear_columns(&self, key: &str, columns: &[String]) -> AdapterResult<()> {
        let mut assignments = Vec::with_capacity(columns.len());
        for name in columns {
            let logical_type = self
                .schema
                .property_type(name)
                .ok_or_else(|| ModelError::UnknownProperty(name.clone()))?;
            assignments.push(Assignment::new(name, encode_value(name, logical_type, &Value::Null)?));
        }
        self.execute(Statement::Update {
            keyspace: self.keyspace().to_string(),
            table: self.table.clone(),
            assignments,
            filter: self.key_filter(key)?,
        })
        .await?;
        Ok(())
    }

    /// Reads one instance; `None` when no row exists.
    pub async fn get(&self, key: &str) -> AdapterResult<Option<Model>> {
        let rows = self
            .execute(Statement::Select {
                keyspace: self.keyspace().to_string(),
                table: self.table.clone(),
                filter: self.key_filter(key)?,
            })
            .await?;
        Ok(self.inflate(rows.first()))
    }

    /// Reads several instances with one `IN` query. Missing keys are skipped.
    pub async fn get_batch<K: AsRef<str>>(&self, keys: &[K]) -> AdapterResult<Vec<Model>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let key_type = self.schema.key_type();
        let values = keys
            .iter()
            .map(|key| encode_key(key_type, key.as_ref()))
            .collect::<Result<Vec<BoundValue>, _>>()?;
        let rows = self
            .execute(Statement::Select {
                keyspace: self.keyspace().to_string(),
                table: self.table.clone(),
                filter: Filter::In {
                    column: self.schema.key_field().to_string(),
                    values,
                },
            })
            .await?;
        Ok(self.inflate_many(&rows))
    }

    /// Reads every row of the table.
    pub async fn all(&self) -> AdapterResult<Listing> {
        let rows = self
            .execute(Statement::Select {
                keyspace: self.keyspace().to_string(),
                table: self.table.clone(),
                filter: Filter::All,
            })
            .await?;
        Ok(Listing {
            models: self.inflate_many(&rows),
            fully_materialized: true,
        })
    }

    /// Deletes the row of `model`, cascades its declared attachments and
    /// tombstones the instance.
    ///
    /// # Errors
    /// - `MissingKey` when the key is unset; nothing is sent.
    /// - `AlreadyDestroyed` when the instance was removed before.
    pub async fn remove(&self, model: &mut Model) -> AdapterResult<()> {
        let key = destroy_key(model)?;

        self.execute(Statement::Delete {
            keyspace: self.keyspace().to_string(),
            table: self.table.clone(),
            filter: self.key_filter(&key)?,
        })
        .await?;
        self.remove_all_attachments(&key).await?;

        model.mark_destroyed();
        Ok(())
    }

    /// Deletes several instances with one `IN` query and a joined fan-out of
    /// attachment removals. `None` or an empty slice is an immediate success.
    pub async fn destroy_many(&self, models: Option<&mut [Model]>) -> AdapterResult<()> {
        let Some(models) = models.filter(|models| !models.is_empty()) else {
            return Ok(());
        };

        let keys = models
            .iter()
            .map(destroy_key)
            .collect::<AdapterResult<Vec<String>>>()?;
        let key_type = self.schema.key_type();
        let values = keys
            .iter()
            .map(|key| encode_key(key_type, key))
            .collect::<Result<Vec<BoundValue>, _>>()?;

        self.execute(Statement::Delete {
            keyspace: self.keyspace().to_string(),
            table: self.table.clone(),
            filter: Filter::In {
                column: self.schema.key_field().to_string(),
                values,
            },
        })
        .await?;
        try_join_all(keys.iter().map(|key| self.remove_all_attachments(key))).await?;

        for model in models.iter_mut() {
            model.mark_destroyed();
        }
        Ok(())
    }

    /// Rebuilds an instance from a raw row; `None` for no row.
    pub fn inflate(&self, row: Option<&Row>) -> Option<Model> {
        inflate_row(&self.schema, row)
    }

    pub fn inflate_many(&self, rows: &[Row]) -> Vec<Model> {
        rows.iter()
            .filter_map(|row| inflate_row(&self.schema, Some(row)))
            .collect()
    }

    /// Releases nothing: the transport lifecycle belongs to whoever created it.
    pub async fn shutdown(&self) -> AdapterResult<()> {
        debug!(
            "event=adapter_shutdown module=adapter status=ok keyspace={} table={}",
            self.keyspace(),
            self.table
        );
        Ok(())
    }

    fn key_filter(&self, key: &str) -> AdapterResult<Filter> {
        Ok(Filter::Eq {
            column: self.schema.key_field().to_string(),
            value: encode_key(self.schema.key_type(), key)?,
        })
    }

    async fn execute_ddl(&self, statement: Statement) -> AdapterResult<()> {
        match self.transport.execute(&statement).await {
            Ok(_) => Ok(()),
            Err(err) if ALREADY_EXISTS_RE.is_match(err.why()) => {
                debug!(
                    "event=adapter_provision module=adapter status=ok statement={} table={} note=already_exists",
                    statement.kind(),
                    statement.table().unwrap_or("-")
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=adapter_provision module=adapter status=error statement={} table={} error_kind={}",
                    statement.kind(),
                    statement.table().unwrap_or("-"),
                    err.kind.as_str()
                );
                Err(err.into())
            }
        }
    }

    async fn execute(&self, statement: Statement) -> AdapterResult<Vec<Row>> {
        self.transport.execute(&statement).await.map_err(|err| {
            warn!(
                "event=adapter_execute module=adapter status=error statement={} table={} error_kind={}",
                statement.kind(),
                statement.table().unwrap_or("-"),
                err.kind.as_str()
            );
            AdapterError::Transport(err)
        })
    }
}

fn destroy_key(model: &Model) -> AdapterResult<String> {
    let key = model.key().ok_or(AdapterError::MissingKey {
        operation: "destroy",
    })?;
    if model.is_destroyed() {
        return Err(AdapterError::AlreadyDestroyed);
    }
    Ok(key)
}
