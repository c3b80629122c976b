//! Model schema descriptors.
//!
//! # Responsibility
//! - Describe one model type: names, key field, property types and declared
//!   attachments.
//! - Expose that description to the adapter through `SchemaDescriptor`.
//!
//! # Invariants
//! - Every property type is resolved against the registry at build time and is
//!   immutable afterwards.
//! - The key field is always a declared property.
//! - Property, table and attachment names are plain identifiers.

use crate::types::{LogicalType, TypeError, TypeRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const DEFAULT_KEY_FIELD: &str = "id";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern must compile"));

/// Capabilities the adapter needs from a model type.
pub trait SchemaDescriptor: Send + Sync {
    fn key_field(&self) -> &str;
    fn property_type(&self, name: &str) -> Option<&LogicalType>;
    /// Declared properties in declaration order.
    fn property_types(&self) -> Vec<(&str, &LogicalType)>;
    /// Row table name.
    fn plural(&self) -> &str;
    fn singular(&self) -> &str;
    /// Every attachment name ever declared for the model type.
    fn attachment_names(&self) -> Vec<&str>;
}

/// Errors raised while building a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidName(String),
    DuplicateProperty(String),
    DuplicateAttachment(String),
    MissingKeyField(String),
    Type(TypeError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid schema identifier `{name}`"),
            Self::DuplicateProperty(name) => write!(f, "property declared twice: {name}"),
            Self::DuplicateAttachment(name) => write!(f, "attachment declared twice: {name}"),
            Self::MissingKeyField(name) => {
                write!(f, "key field `{name}` is not a declared property")
            }
            Self::Type(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Type(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TypeError> for SchemaError {
    fn from(value: TypeError) -> Self {
        Self::Type(value)
    }
}

/// Concrete schema descriptor bound to one type registry.
#[derive(Debug)]
pub struct Schema {
    singular: String,
    plural: String,
    key_field: String,
    key_type: LogicalType,
    properties: Vec<(String, LogicalType)>,
    attachments: Vec<(String, String)>,
    registry: Arc<TypeRegistry>,
}

impl Schema {
    pub fn builder(
        registry: Arc<TypeRegistry>,
        singular: impl Into<String>,
        plural: impl Into<String>,
    ) -> SchemaBuilder {
        SchemaBuilder {
            singular: singular.into(),
            plural: plural.into(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            properties: Vec::new(),
            attachments: Vec::new(),
            registry,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn key_type(&self) -> &LogicalType {
        &self.key_type
    }

    /// Declared content type of attachment `name`.
    pub fn attachment_content_type(&self, name: &str) -> Option<&str> {
        self.attachments
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, content_type)| content_type.as_str())
    }

    /// Side table holding this model's attachments.
    pub fn attachment_table(&self) -> String {
        format!("{}_attachments", self.plural)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

impl SchemaDescriptor for Schema {
    fn key_field(&self) -> &str {
        &self.key_field
    }

    fn property_type(&self, name: &str) -> Option<&LogicalType> {
        self.properties
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, logical_type)| logical_type)
    }

    fn property_types(&self) -> Vec<(&str, &LogicalType)> {
        self.properties
            .iter()
            .map(|(name, logical_type)| (name.as_str(), logical_type))
            .collect()
    }

    fn plural(&self) -> &str {
        &self.plural
    }

    fn singular(&self) -> &str {
        &self.singular
    }

    fn attachment_names(&self) -> Vec<&str> {
        self.attachments.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Collects a schema declaration; validation happens in `build`.
#[derive(Debug)]
pub struct SchemaBuilder {
    singular: String,
    plural: String,
    key_field: String,
    properties: Vec<(String, String)>,
    attachments: Vec<(String, String)>,
    registry: Arc<TypeRegistry>,
}

impl SchemaBuilder {
    /// Overrides the key field (default `id`).
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = name.into();
        self
    }

    pub fn property(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.properties.push((name.into(), type_name.into()));
        self
    }

    pub fn attachment(mut self, name: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.attachments.push((name.into(), content_type.into()));
        self
    }

    /// Resolves every declared type and checks names.
    ///
    /// # Errors
    /// - `InvalidName` for names that are not plain identifiers.
    /// - `DuplicateProperty` / `DuplicateAttachment` for repeated names.
    /// - `Type` when a type name is malformed or not registered.
    /// - `MissingKeyField` when the key field is not a declared property.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        ensure_identifier(&self.singular)?;
        ensure_identifier(&self.plural)?;

        let mut properties: Vec<(String, LogicalType)> = Vec::with_capacity(self.properties.len());
        for (name, type_name) in &self.properties {
            ensure_identifier(name)?;
            if properties.iter().any(|(declared, _)| declared == name) {
                return Err(SchemaError::DuplicateProperty(name.clone()));
            }
            let logical_type = self.registry.resolve(type_name)?;
            properties.push((name.clone(), logical_type));
        }

        let Some(key_type) = properties
            .iter()
            .find(|(name, _)| *name == self.key_field)
            .map(|(_, logical_type)| logical_type.clone())
        else {
            return Err(SchemaError::MissingKeyField(self.key_field));
        };

        let mut attachments: Vec<(String, String)> = Vec::with_capacity(self.attachments.len());
        for (name, content_type) in self.attachments {
            if name.is_empty() || name.contains(':') {
                return Err(SchemaError::InvalidName(name));
            }
            if attachments.iter().any(|(declared, _)| *declared == name) {
                return Err(SchemaError::DuplicateAttachment(name));
            }
            attachments.push((name, content_type));
        }

        Ok(Arc::new(Schema {
            singular: self.singular,
            plural: self.plural,
            key_field: self.key_field,
            key_type,
            properties,
            attachments,
            registry: self.registry,
        }))
    }
}

fn ensure_identifier(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}
