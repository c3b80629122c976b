//! In-memory model instances.
//!
//! # Responsibility
//! - Hold typed property values for one schema-described object.
//! - Track dirty and destroyed state across the persistence lifecycle.
//! - Carry pending attachments until the next save.
//!
//! # Invariants
//! - Assignment through `Model::set` validates against the property's logical
//!   type; rejected values leave the instance unchanged.
//! - A freshly created instance holds a default for every declared property.
//! - Restored instances are clean.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attachment;
mod instance;
pub mod value;

pub use attachment::{attachment_key, Attachment, AttachmentBody};
pub use instance::Model;
pub use value::Value;

pub type ModelResult<T> = Result<T, ModelError>;

/// Rejected model mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownProperty(String),
    InvalidValue { property: String, logical_type: String },
    UnknownAttachment(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProperty(name) => write!(f, "unknown property `{name}`"),
            Self::InvalidValue {
                property,
                logical_type,
            } => write!(f, "invalid value for property `{property}` of type {logical_type}"),
            Self::UnknownAttachment(name) => write!(f, "unknown attachment `{name}`"),
        }
    }
}

impl Error for ModelError {}
