//! Object-to-row and row-to-object conversion.
//!
//! # Responsibility
//! - Flatten model instances into typed column assignments for writes.
//! - Rebuild model instances from raw rows on reads.
//!
//! # Invariants
//! - Empty sets and maps are omitted on write and read back as empty
//!   containers.
//! - Lists are always written, even when empty.
//! - Opaque blobs travel as JSON text; malformed stored JSON never fails a
//!   read.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod date;
mod inflate;
mod serialize;

pub use inflate::{decode_value, inflate_row};
pub use serialize::{encode_key, encode_value, serialize_model, SerializedModel};

pub type CodecResult<T> = Result<T, CodecError>;

/// Values the serializer cannot encode for their column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    InvalidDate { property: String },
    InvalidUuid { property: String },
    NullElement { property: String },
    Unencodable { property: String, logical_type: String },
    InvalidKey(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { property } => {
                write!(f, "property `{property}` does not hold a valid date")
            }
            Self::InvalidUuid { property } => {
                write!(f, "property `{property}` does not hold a valid uuid")
            }
            Self::NullElement { property } => {
                write!(f, "collection property `{property}` contains a null element")
            }
            Self::Unencodable {
                property,
                logical_type,
            } => write!(f, "property `{property}` cannot be encoded as {logical_type}"),
            Self::InvalidKey(key) => write!(f, "key `{key}` does not fit the key column"),
        }
    }
}

impl Error for CodecError {}
