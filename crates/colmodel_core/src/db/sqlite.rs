//! SQLite-backed emulation of the column store.
//!
//! # Responsibility
//! - Execute structured statements against SQLite with column-store semantics.
//! - Keep a catalog of keyspaces, tables and column types so stored cells
//!   decode back into typed column values.
//!
//! # Invariants
//! - Inserts and updates are upserts that touch only the named columns.
//! - Collections are stored as JSON text; empty collections are stored as null.
//! - Sets are stored sorted and de-duplicated; maps are stored key-sorted.
//! - Only primary-key restrictions are accepted in filters.
//! - Creating an existing keyspace or table fails with a message starting with
//!   `Cannot add already existing`.

use super::statement::{Assignment, ColumnDef, Filter, Statement};
use super::{ColumnValue, FailureObserver, Row, Transport, TransportError, TransportErrorKind, TransportResult};
use crate::types::{ColumnType, Primitive};
use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern must compile"));

/// Column-store transport over one SQLite connection.
pub struct SqliteTransport {
    conn: Arc<Mutex<Connection>>,
    observer: Mutex<Option<FailureObserver>>,
}

impl SqliteTransport {
    /// Wraps an already bootstrapped connection (see `open_db`).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            observer: Mutex::new(None),
        }
    }

    /// Opens a bootstrapped in-memory store with the default busy timeout.
    pub fn open_in_memory() -> TransportResult<Self> {
        let conn = super::open_db_in_memory(crate::config::AdapterOptions::default().timeout())?;
        Ok(Self::new(conn))
    }

    fn notify_failure(&self, err: &TransportError) {
        let observer = match self.observer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(observer) = observer {
            observer(err);
        }
    }
}

#[async_trait]
impl Transport for SqliteTransport {
    async fn execute(&self, statement: &Statement) -> TransportResult<Vec<Row>> {
        let started_at = Instant::now();
        let conn = Arc::clone(&self.conn);
        let owned = statement.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TransportError::connection("sqlite connection lock poisoned"))?;
            execute_blocking(&mut guard, &owned)
        })
        .await
        .map_err(|err| TransportError::connection(format!("spawn_blocking join error: {err}")))
        .and_then(|result| result);

        match &result {
            Ok(rows) => debug!(
                "event=transport_execute module=db status=ok statement={} table={} rows={} duration_ms={}",
                statement.kind(),
                statement.table().unwrap_or("-"),
                rows.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => {
                debug!(
                    "event=transport_execute module=db status=error statement={} table={} error_kind={} duration_ms={}",
                    statement.kind(),
                    statement.table().unwrap_or("-"),
                    err.kind.as_str(),
                    started_at.elapsed().as_millis()
                );
                if err.kind == TransportErrorKind::Connection {
                    self.notify_failure(err);
                }
            }
        }

        result
    }

    fn set_failure_observer(&self, observer: FailureObserver) {
        match self.observer.lock() {
            Ok(mut guard) => *guard = Some(observer),
            Err(poisoned) => {
                warn!("event=transport_observer module=db status=error error_code=lock_poisoned");
                *poisoned.into_inner() = Some(observer);
            }
        }
    }

    fn has_failure_observer(&self) -> bool {
        match self.observer.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

/// Catalog view of one table.
struct TableInfo {
    physical_name: String,
    primary_key: String,
    columns: Vec<(String, ColumnType)>,
}

impl TableInfo {
    fn column_type(&self, column: &str) -> TransportResult<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, column_type)| *column_type)
            .ok_or_else(|| TransportError::invalid_data(format!("Undefined column name {column}")))
    }
}

fn execute_blocking(conn: &mut Connection, statement: &Statement) -> TransportResult<Vec<Row>> {
    match statement {
        Statement::CreateKeyspace {
            keyspace,
            replication_factor,
        } => {
            create_keyspace(conn, keyspace, *replication_factor)?;
            Ok(Vec::new())
        }
        Statement::CreateTable {
            keyspace,
            table,
            columns,
            primary_key,
        } => {
            create_table(conn, keyspace, table, columns, primary_key)?;
            Ok(Vec::new())
        }
        Statement::Insert {
            keyspace,
            table,
            values,
        } => {
            let info = load_table(conn, keyspace, table)?;
            let has_key = values.iter().any(|value| value.column == info.primary_key);
            if !has_key {
                return Err(TransportError::invalid_data(format!(
                    "Missing mandatory PRIMARY KEY part {}",
                    info.primary_key
                )));
            }
            upsert(conn, &info, values)?;
            Ok(Vec::new())
        }
        Statement::Update {
            keyspace,
            table,
            assignments,
            filter,
        } => {
            let info = load_table(conn, keyspace, table)?;
            let Filter::Eq { column, value } = filter else {
                return Err(TransportError::invalid_data(
                    "UPDATE requires an equality restriction on the primary key",
                ));
            };
            ensure_primary_key(&info, column)?;
            if assignments.iter().any(|assignment| &assignment.column == column) {
                return Err(TransportError::invalid_data(format!(
                    "PRIMARY KEY part {column} found in SET part"
                )));
            }
            let mut values = assignments.clone();
            values.push(Assignment::new(column.clone(), value.clone()));
            upsert(conn, &info, &values)?;
            Ok(Vec::new())
        }
        Statement::Select {
            keyspace,
            table,
            filter,
        } => {
            let info = load_table(conn, keyspace, table)?;
            select(conn, &info, filter)
        }
        Statement::Delete {
            keyspace,
            table,
            filter,
        } => {
            let info = load_table(conn, keyspace, table)?;
            if matches!(filter, Filter::All) {
                return Err(TransportError::invalid_data(
                    "DELETE requires a restriction on the primary key",
                ));
            }
            let (clause, bound) = where_clause(&info, filter)?;
            conn.execute(
                &format!("DELETE FROM {}{clause};", quote(&info.physical_name)),
                params_from_iter(bound),
            )?;
            Ok(Vec::new())
        }
    }
}

fn create_keyspace(conn: &Connection, keyspace: &str, replication_factor: u32) -> TransportResult<()> {
    ensure_identifier(keyspace)?;
    if keyspace_exists(conn, keyspace)? {
        return Err(TransportError::query(format!(
            "Cannot add already existing keyspace \"{keyspace}\""
        )));
    }
    conn.execute(
        "INSERT INTO colmodel_keyspaces (name, replication_factor) VALUES (?1, ?2);",
        params![keyspace, replication_factor],
    )?;
    Ok(())
}

fn create_table(
    conn: &mut Connection,
    keyspace: &str,
    table: &str,
    columns: &[ColumnDef],
    primary_key: &str,
) -> TransportResult<()> {
    ensure_identifier(keyspace)?;
    ensure_identifier(table)?;
    for column in columns {
        ensure_identifier(&column.name)?;
    }
    if !keyspace_exists(conn, keyspace)? {
        return Err(TransportError::query(format!(
            "Keyspace \"{keyspace}\" does not exist"
        )));
    }
    if !columns.iter().any(|column| column.name == primary_key) {
        return Err(TransportError::invalid_data(format!(
            "Unknown definition {primary_key} referenced in PRIMARY KEY"
        )));
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT table_name FROM colmodel_tables WHERE keyspace = ?1 AND table_name = ?2;",
            params![keyspace, table],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(TransportError::query(format!(
            "Cannot add already existing table \"{table}\" to keyspace \"{keyspace}\""
        )));
    }

    let physical_name = physical_table_name(keyspace, table);
    let column_sql = columns
        .iter()
        .map(|column| format!("{} {}", quote(&column.name), storage_affinity(column.column_type)))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO colmodel_tables (keyspace, table_name, primary_key) VALUES (?1, ?2, ?3);",
        params![keyspace, table, primary_key],
    )?;
    for (ordinal, column) in columns.iter().enumerate() {
        tx.execute(
            "INSERT INTO colmodel_columns (keyspace, table_name, column_name, column_type, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                keyspace,
                table,
                column.name,
                column.column_type.to_string(),
                ordinal as i64
            ],
        )?;
    }
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({column_sql}, PRIMARY KEY ({}));",
        quote(&physical_name),
        quote(primary_key)
    ))?;
    tx.commit()?;
    Ok(())
}

fn load_table(conn: &Connection, keyspace: &str, table: &str) -> TransportResult<TableInfo> {
    let primary_key: Option<String> = conn
        .query_row(
            "SELECT primary_key FROM colmodel_tables WHERE keyspace = ?1 AND table_name = ?2;",
            params![keyspace, table],
            |row| row.get(0),
        )
        .optional()?;
    let Some(primary_key) = primary_key else {
        return Err(TransportError::query(format!(
            "unconfigured table {table} in keyspace {keyspace}"
        )));
    };

    let mut stmt = conn.prepare(
        "SELECT column_name, column_type
         FROM colmodel_columns
         WHERE keyspace = ?1 AND table_name = ?2
         ORDER BY ordinal ASC;",
    )?;
    let mut rows = stmt.query(params![keyspace, table])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let type_text: String = row.get(1)?;
        let column_type = ColumnType::parse(&type_text).ok_or_else(|| {
            TransportError::invalid_data(format!(
                "invalid column type `{type_text}` in catalog for {keyspace}.{table}.{name}"
            ))
        })?;
        columns.push((name, column_type));
    }

    Ok(TableInfo {
        physical_name: physical_table_name(keyspace, table),
        primary_key,
        columns,
    })
}

fn upsert(conn: &Connection, info: &TableInfo, values: &[Assignment]) -> TransportResult<()> {
    let mut names = Vec::with_capacity(values.len());
    let mut bound = Vec::with_capacity(values.len());
    for assignment in values {
        let column_type = info.column_type(&assignment.column)?;
        if assignment.column == info.primary_key && assignment.value.value.is_null() {
            return Err(TransportError::invalid_data(format!(
                "Invalid null value for primary key {}",
                info.primary_key
            )));
        }
        bound.push(to_sql(&assignment.column, column_type, &assignment.value.value)?);
        names.push(quote(&assignment.column));
    }

    let placeholders = (1..=bound.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = values
        .iter()
        .filter(|assignment| assignment.column != info.primary_key)
        .map(|assignment| format!("{0} = excluded.{0}", quote(&assignment.column)))
        .collect::<Vec<_>>();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT({}) {conflict};",
            quote(&info.physical_name),
            names.join(", "),
            quote(&info.primary_key)
        ),
        params_from_iter(bound),
    )?;
    Ok(())
}

fn select(conn: &Connection, info: &TableInfo, filter: &Filter) -> TransportResult<Vec<Row>> {
    let column_list = info
        .columns
        .iter()
        .map(|(name, _)| quote(name))
        .collect::<Vec<_>>()
        .join(", ");
    let (clause, bound) = where_clause(info, filter)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {column_list} FROM {}{clause};",
        quote(&info.physical_name)
    ))?;
    let mut rows = stmt.query(params_from_iter(bound))?;
    let mut results = Vec::new();

    while let Some(row) = rows.next()? {
        let mut decoded = Row::new();
        for (index, (name, column_type)) in info.columns.iter().enumerate() {
            let raw: SqlValue = row.get(index)?;
            decoded.insert(name.clone(), from_sql(name, *column_type, raw)?);
        }
        results.push(decoded);
    }

    Ok(results)
}

fn where_clause(info: &TableInfo, filter: &Filter) -> TransportResult<(String, Vec<SqlValue>)> {
    match filter {
        Filter::All => Ok((String::new(), Vec::new())),
        Filter::Eq { column, value } => {
            ensure_primary_key(info, column)?;
            let column_type = info.column_type(column)?;
            Ok((
                format!(" WHERE {} = ?1", quote(column)),
                vec![to_sql(column, column_type, &value.value)?],
            ))
        }
        Filter::In { column, values } => {
            ensure_primary_key(info, column)?;
            let column_type = info.column_type(column)?;
            if values.is_empty() {
                return Ok((" WHERE 0".to_string(), Vec::new()));
            }
            let bound = values
                .iter()
                .map(|value| to_sql(column, column_type, &value.value))
                .collect::<TransportResult<Vec<_>>>()?;
            let placeholders = (1..=bound.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            Ok((format!(" WHERE {} IN ({placeholders})", quote(column)), bound))
        }
    }
}

fn ensure_primary_key(info: &TableInfo, column: &str) -> TransportResult<()> {
    if column != info.primary_key {
        return Err(TransportError::invalid_data(format!(
            "Cannot restrict on non-primary-key column {column}"
        )));
    }
    Ok(())
}

fn keyspace_exists(conn: &Connection, keyspace: &str) -> TransportResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM colmodel_keyspaces WHERE name = ?1);",
        [keyspace],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_identifier(name: &str) -> TransportResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(TransportError::invalid_data(format!("invalid identifier `{name}`")))
    }
}

fn physical_table_name(keyspace: &str, table: &str) -> String {
    format!("{keyspace}.{table}")
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn storage_affinity(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Primitive(Primitive::Double) => "REAL",
        ColumnType::Primitive(Primitive::Boolean | Primitive::Timestamp) => "INTEGER",
        _ => "TEXT",
    }
}

fn mismatch(column: &str, column_type: ColumnType, value: &ColumnValue) -> TransportError {
    TransportError::invalid_data(format!(
        "Invalid value {value:?} for column {column} of type {column_type}"
    ))
}

fn to_sql(column: &str, column_type: ColumnType, value: &ColumnValue) -> TransportResult<SqlValue> {
    let encoded = match (column_type, value) {
        (_, ColumnValue::Null) => SqlValue::Null,
        (ColumnType::Primitive(primitive), value) => {
            match element_to_json(column, primitive, value)? {
                JsonValue::Bool(flag) => SqlValue::Integer(i64::from(flag)),
                JsonValue::Number(number) => match primitive {
                    Primitive::Double => SqlValue::Real(number.as_f64().unwrap_or_default()),
                    _ => SqlValue::Integer(number.as_i64().unwrap_or_default()),
                },
                JsonValue::String(text) => SqlValue::Text(text),
                _ => return Err(mismatch(column, column_type, value)),
            }
        }
        (ColumnType::List(element), ColumnValue::List(items)) => {
            if items.is_empty() {
                SqlValue::Null
            } else {
                let encoded = items
                    .iter()
                    .map(|item| element_to_json(column, element, item))
                    .collect::<TransportResult<Vec<_>>>()?;
                SqlValue::Text(JsonValue::Array(encoded).to_string())
            }
        }
        (ColumnType::Set(element), ColumnValue::Set(items)) => {
            let mut items = items.clone();
            items.sort_by(compare_elements);
            items.dedup();
            if items.is_empty() {
                SqlValue::Null
            } else {
                let encoded = items
                    .iter()
                    .map(|item| element_to_json(column, element, item))
                    .collect::<TransportResult<Vec<_>>>()?;
                SqlValue::Text(JsonValue::Array(encoded).to_string())
            }
        }
        (ColumnType::Map(_, element), ColumnValue::Map(entries)) => {
            if entries.is_empty() {
                SqlValue::Null
            } else {
                let mut encoded = JsonMap::new();
                for (key, item) in entries {
                    encoded.insert(key.clone(), element_to_json(column, element, item)?);
                }
                SqlValue::Text(JsonValue::Object(encoded).to_string())
            }
        }
        _ => return Err(mismatch(column, column_type, value)),
    };
    Ok(encoded)
}

fn element_to_json(column: &str, primitive: Primitive, value: &ColumnValue) -> TransportResult<JsonValue> {
    let column_type = ColumnType::Primitive(primitive);
    match (primitive, value) {
        (Primitive::Text, ColumnValue::Text(text)) => Ok(JsonValue::String(text.clone())),
        (Primitive::Double, ColumnValue::Double(number)) => JsonNumber::from_f64(*number)
            .map(JsonValue::Number)
            .ok_or_else(|| mismatch(column, column_type, value)),
        (Primitive::Boolean, ColumnValue::Boolean(flag)) => Ok(JsonValue::Bool(*flag)),
        (Primitive::Timestamp, ColumnValue::Timestamp(millis)) => {
            Ok(JsonValue::Number(JsonNumber::from(*millis)))
        }
        (Primitive::Uuid, ColumnValue::Uuid(id)) => Ok(JsonValue::String(id.to_string())),
        (Primitive::TimeUuid, ColumnValue::Uuid(id)) if id.get_version_num() == 1 => {
            Ok(JsonValue::String(id.to_string()))
        }
        _ => Err(mismatch(column, column_type, value)),
    }
}

fn from_sql(column: &str, column_type: ColumnType, raw: SqlValue) -> TransportResult<ColumnValue> {
    let corrupt = || {
        TransportError::invalid_data(format!(
            "stored value for column {column} does not decode as {column_type}"
        ))
    };

    let decoded = match (column_type, raw) {
        (_, SqlValue::Null) => ColumnValue::Null,
        (ColumnType::Primitive(primitive), raw) => {
            let json = match raw {
                SqlValue::Integer(number) if primitive == Primitive::Boolean => {
                    JsonValue::Bool(number != 0)
                }
                SqlValue::Integer(number) => JsonValue::Number(JsonNumber::from(number)),
                SqlValue::Real(number) => {
                    JsonNumber::from_f64(number).map(JsonValue::Number).ok_or_else(corrupt)?
                }
                SqlValue::Text(text) => JsonValue::String(text),
                _ => return Err(corrupt()),
            };
            element_from_json(primitive, &json).ok_or_else(corrupt)?
        }
        (collection, SqlValue::Text(text)) => {
            let json: JsonValue = serde_json::from_str(&text).map_err(|_| corrupt())?;
            match (collection, json) {
                (ColumnType::List(element), JsonValue::Array(items)) => ColumnValue::List(
                    items
                        .iter()
                        .map(|item| element_from_json(element, item))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(corrupt)?,
                ),
                (ColumnType::Set(element), JsonValue::Array(items)) => ColumnValue::Set(
                    items
                        .iter()
                        .map(|item| element_from_json(element, item))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(corrupt)?,
                ),
                (ColumnType::Map(_, element), JsonValue::Object(entries)) => ColumnValue::Map(
                    entries
                        .iter()
                        .map(|(key, item)| {
                            element_from_json(element, item).map(|value| (key.clone(), value))
                        })
                        .collect::<Option<BTreeMap<_, _>>>()
                        .ok_or_else(corrupt)?,
                ),
                _ => return Err(corrupt()),
            }
        }
        _ => return Err(corrupt()),
    };
    Ok(decoded)
}

fn element_from_json(primitive: Primitive, json: &JsonValue) -> Option<ColumnValue> {
    match (primitive, json) {
        (Primitive::Text, JsonValue::String(text)) => Some(ColumnValue::Text(text.clone())),
        (Primitive::Double, JsonValue::Number(number)) => number.as_f64().map(ColumnValue::Double),
        (Primitive::Boolean, JsonValue::Bool(flag)) => Some(ColumnValue::Boolean(*flag)),
        (Primitive::Timestamp, JsonValue::Number(number)) => {
            number.as_i64().map(ColumnValue::Timestamp)
        }
        (Primitive::Uuid | Primitive::TimeUuid, JsonValue::String(text)) => {
            Uuid::parse_str(text).ok().map(ColumnValue::Uuid)
        }
        _ => None,
    }
}

/// Set element order: natural order of the element type.
fn compare_elements(left: &ColumnValue, right: &ColumnValue) -> Ordering {
    match (left, right) {
        (ColumnValue::Text(a), ColumnValue::Text(b)) => a.cmp(b),
        (ColumnValue::Double(a), ColumnValue::Double(b)) => a.total_cmp(b),
        (ColumnValue::Boolean(a), ColumnValue::Boolean(b)) => a.cmp(b),
        (ColumnValue::Timestamp(a), ColumnValue::Timestamp(b)) => a.cmp(b),
        (ColumnValue::Uuid(a), ColumnValue::Uuid(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
