//! Logical property types, their validators and their storage column types.
//!
//! # Responsibility
//! - Name the declared semantic type of every model property.
//! - Own the explicit type registry (defaults + validators) shared by schemas.
//! - Map logical types onto physical column types for DDL and value binding.
//!
//! # Invariants
//! - A registry is constructed explicitly and passed by reference; there is no
//!   process-global type table.
//! - Column mapping is total: anything without a dedicated column type is
//!   stored as `text`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod column;
pub mod logical;
pub mod registry;
pub mod validate;

pub use column::{column_type_for, ColumnType, Primitive};
pub use logical::{LogicalType, OpaqueType, ScalarType};
pub use registry::{DefaultFn, TypeDefinition, TypeRegistry, Validator};

pub type TypeResult<T> = Result<T, TypeError>;

/// Errors raised while parsing, registering or resolving logical types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Type name is empty or contains characters outside `[a-z0-9_:]`.
    InvalidTypeName(String),
    /// Type name was never registered in the registry used for lookup.
    UnknownType(String),
    /// Type name is already registered.
    DuplicateType(String),
}

impl Display for TypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => write!(f, "invalid logical type name `{name}`"),
            Self::UnknownType(name) => write!(f, "unknown logical type `{name}`"),
            Self::DuplicateType(name) => write!(f, "logical type already registered: {name}"),
        }
    }
}

impl Error for TypeError {}
