//! Logical type names and their parsed form.

use super::{TypeError, TypeResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Scalar logical types. Collections are built from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Date,
    Uuid,
    TimeUuid,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        ScalarType::String,
        ScalarType::Number,
        ScalarType::Boolean,
        ScalarType::Date,
        ScalarType::Uuid,
        ScalarType::TimeUuid,
    ];

    /// Stable name used in schema declarations.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::TimeUuid => "timeuuid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "uuid" => Some(Self::Uuid),
            "timeuuid" => Some(Self::TimeUuid),
            _ => None,
        }
    }
}

/// Types whose values are stored as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpaqueType {
    Array,
    Hash,
    Reference,
    Untyped,
}

impl OpaqueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Hash => "hash",
            Self::Reference => "reference",
            Self::Untyped => "untyped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "array" => Some(Self::Array),
            "hash" => Some(Self::Hash),
            "reference" => Some(Self::Reference),
            "untyped" => Some(Self::Untyped),
            _ => None,
        }
    }
}

/// Declared semantic type of one model property.
///
/// `Custom` carries names registered by callers outside the built-in set; they
/// are stored like opaque blobs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalType {
    Scalar(ScalarType),
    List(ScalarType),
    Set(ScalarType),
    Map(ScalarType),
    Opaque(OpaqueType),
    Custom(String),
}

impl LogicalType {
    /// Parses a type name syntactically.
    ///
    /// Whether the name is usable is decided by the registry; `set:boolean`
    /// parses here but is not registered by the built-ins.
    pub fn parse(name: &str) -> TypeResult<Self> {
        let normalized = name.trim();
        if normalized.is_empty() || !normalized.chars().all(is_type_name_char) {
            return Err(TypeError::InvalidTypeName(name.to_string()));
        }

        if let Some(scalar) = ScalarType::parse(normalized) {
            return Ok(Self::Scalar(scalar));
        }
        if let Some(opaque) = OpaqueType::parse(normalized) {
            return Ok(Self::Opaque(opaque));
        }

        if let Some((prefix, element)) = normalized.split_once(':') {
            if let Some(scalar) = ScalarType::parse(element) {
                match prefix {
                    "list" => return Ok(Self::List(scalar)),
                    "set" => return Ok(Self::Set(scalar)),
                    "map" => return Ok(Self::Map(scalar)),
                    _ => {}
                }
            }
        }

        Ok(Self::Custom(normalized.to_string()))
    }

    /// Canonical declaration name, e.g. `set:uuid`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Element type of a list, set or map.
    pub fn element(&self) -> Option<ScalarType> {
        match self {
            Self::List(element) | Self::Set(element) | Self::Map(element) => Some(*element),
            _ => None,
        }
    }

    /// Values of this type travel through storage as JSON text.
    pub fn is_json_encoded(&self) -> bool {
        matches!(self, Self::Opaque(_) | Self::Custom(_))
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(scalar) => f.write_str(scalar.as_str()),
            Self::List(element) => write!(f, "list:{}", element.as_str()),
            Self::Set(element) => write!(f, "set:{}", element.as_str()),
            Self::Map(element) => write!(f, "map:{}", element.as_str()),
            Self::Opaque(opaque) => f.write_str(opaque.as_str()),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for LogicalType {
    type Err = TypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn is_type_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == ':'
}
