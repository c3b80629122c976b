//! Structured storage statements.
//!
//! Statements carry their bound values next to the column type each value is
//! encoded as. `Display` renders the CQL text with `?` placeholders in the
//! order returned by `Statement::parameters`.

use super::ColumnValue;
use crate::types::ColumnType;
use std::fmt::{Display, Formatter};

/// A parameter value tagged with its column type.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub column_type: ColumnType,
    pub value: ColumnValue,
}

impl BoundValue {
    pub fn new(column_type: ColumnType, value: ColumnValue) -> Self {
        Self { column_type, value }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ColumnType::TEXT, ColumnValue::Text(value.into()))
    }
}

/// Column declaration in a `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// `column = ?` pair in an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: BoundValue,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: BoundValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Row restriction for reads, updates and deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq { column: String, value: BoundValue },
    In { column: String, values: Vec<BoundValue> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateKeyspace {
        keyspace: String,
        replication_factor: u32,
    },
    CreateTable {
        keyspace: String,
        table: String,
        columns: Vec<ColumnDef>,
        primary_key: String,
    },
    Insert {
        keyspace: String,
        table: String,
        values: Vec<Assignment>,
    },
    Update {
        keyspace: String,
        table: String,
        assignments: Vec<Assignment>,
        filter: Filter,
    },
    Select {
        keyspace: String,
        table: String,
        filter: Filter,
    },
    Delete {
        keyspace: String,
        table: String,
        filter: Filter,
    },
}

impl Statement {
    /// Short statement kind used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateKeyspace { .. } => "create_keyspace",
            Self::CreateTable { .. } => "create_table",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Select { .. } => "select",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn keyspace(&self) -> &str {
        match self {
            Self::CreateKeyspace { keyspace, .. }
            | Self::CreateTable { keyspace, .. }
            | Self::Insert { keyspace, .. }
            | Self::Update { keyspace, .. }
            | Self::Select { keyspace, .. }
            | Self::Delete { keyspace, .. } => keyspace,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateKeyspace { .. } => None,
            Self::CreateTable { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Select { table, .. }
            | Self::Delete { table, .. } => Some(table),
        }
    }

    /// Bound values in placeholder order.
    pub fn parameters(&self) -> Vec<&BoundValue> {
        match self {
            Self::CreateKeyspace { .. } | Self::CreateTable { .. } => Vec::new(),
            Self::Insert { values, .. } => values.iter().map(|assignment| &assignment.value).collect(),
            Self::Update {
                assignments,
                filter,
                ..
            } => assignments
                .iter()
                .map(|assignment| &assignment.value)
                .chain(filter_parameters(filter))
                .collect(),
            Self::Select { filter, .. } | Self::Delete { filter, .. } => {
                filter_parameters(filter).collect()
            }
        }
    }
}

fn filter_parameters(filter: &Filter) -> Box<dyn Iterator<Item = &BoundValue> + '_> {
    match filter {
        Filter::All => Box::new(std::iter::empty()),
        Filter::Eq { value, .. } => Box::new(std::iter::once(value)),
        Filter::In { values, .. } => Box::new(values.iter()),
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::Eq { column, .. } => write!(f, " WHERE {column} = ?"),
            Self::In { column, values } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                write!(f, " WHERE {column} IN ({placeholders})")
            }
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateKeyspace {
                keyspace,
                replication_factor,
            } => write!(
                f,
                "CREATE KEYSPACE {keyspace} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
            ),
            Self::CreateTable {
                keyspace,
                table,
                columns,
                primary_key,
            } => {
                let columns = columns
                    .iter()
                    .map(|column| format!("{} {}", column.name, column.column_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "CREATE TABLE {keyspace}.{table} ({columns}, PRIMARY KEY ({primary_key}))"
                )
            }
            Self::Insert {
                keyspace,
                table,
                values,
            } => {
                let names = values
                    .iter()
                    .map(|assignment| assignment.column.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = vec!["?"; values.len()].join(", ");
                write!(f, "INSERT INTO {keyspace}.{table} ({names}) VALUES ({placeholders})")
            }
            Self::Update {
                keyspace,
                table,
                assignments,
                filter,
            } => {
                let sets = assignments
                    .iter()
                    .map(|assignment| format!("{} = ?", assignment.column))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "UPDATE {keyspace}.{table} SET {sets}{filter}")
            }
            Self::Select {
                keyspace,
                table,
                filter,
            } => write!(f, "SELECT * FROM {keyspace}.{table}{filter}"),
            Self::Delete {
                keyspace,
                table,
                filter,
            } => write!(f, "DELETE FROM {keyspace}.{table}{filter}"),
        }
    }
}
