//! Logical type to storage column type mapping.
//!
//! Used for DDL generation and for tagging bound parameters so the transport
//! knows how to encode them. Total over every logical type: anything without a
//! dedicated column type is stored as `text`.

use super::logical::{LogicalType, ScalarType};
use std::fmt::{Display, Formatter};

/// Native (non-collection) column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Text,
    Double,
    Boolean,
    Timestamp,
    Uuid,
    TimeUuid,
}

impl Primitive {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::TimeUuid => "timeuuid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "text" | "varchar" => Some(Self::Text),
            "double" => Some(Self::Double),
            "boolean" => Some(Self::Boolean),
            "timestamp" => Some(Self::Timestamp),
            "uuid" => Some(Self::Uuid),
            "timeuuid" => Some(Self::TimeUuid),
            _ => None,
        }
    }

    fn for_scalar(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::String => Self::Text,
            ScalarType::Number => Self::Double,
            ScalarType::Boolean => Self::Boolean,
            ScalarType::Date => Self::Timestamp,
            ScalarType::Uuid => Self::Uuid,
            ScalarType::TimeUuid => Self::TimeUuid,
        }
    }
}

/// Physical storage column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Primitive(Primitive),
    List(Primitive),
    Set(Primitive),
    Map(Primitive, Primitive),
}

impl ColumnType {
    pub const TEXT: ColumnType = ColumnType::Primitive(Primitive::Text);

    /// Parses a rendered column type such as `map<text, double>`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let Some(open) = trimmed.find('<') else {
            return Primitive::parse(trimmed).map(Self::Primitive);
        };
        let inner = trimmed[open + 1..].strip_suffix('>')?;
        match &trimmed[..open] {
            "list" => Primitive::parse(inner).map(Self::List),
            "set" => Primitive::parse(inner).map(Self::Set),
            "map" => {
                let (key, value) = inner.split_once(',')?;
                Some(Self::Map(Primitive::parse(key)?, Primitive::parse(value)?))
            }
            _ => None,
        }
    }

    pub fn is_collection(self) -> bool {
        !matches!(self, Self::Primitive(_))
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(primitive) => f.write_str(primitive.as_str()),
            Self::List(element) => write!(f, "list<{}>", element.as_str()),
            Self::Set(element) => write!(f, "set<{}>", element.as_str()),
            Self::Map(key, value) => write!(f, "map<{}, {}>", key.as_str(), value.as_str()),
        }
    }
}

/// Maps a logical type to its storage column type.
pub fn column_type_for(logical_type: &LogicalType) -> ColumnType {
    match logical_type {
        LogicalType::Scalar(scalar) => ColumnType::Primitive(Primitive::for_scalar(*scalar)),
        LogicalType::List(element) => ColumnType::List(Primitive::for_scalar(*element)),
        LogicalType::Set(element) => ColumnType::Set(Primitive::for_scalar(*element)),
        LogicalType::Map(element) => {
            ColumnType::Map(Primitive::Text, Primitive::for_scalar(*element))
        }
        LogicalType::Opaque(_) | LogicalType::Custom(_) => ColumnType::TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::{column_type_for, ColumnType, Primitive};
    use crate::types::LogicalType;

    fn mapped(name: &str) -> String {
        column_type_for(&LogicalType::parse(name).unwrap()).to_string()
    }

    #[test]
    fn maps_scalars_to_native_columns() {
        assert_eq!(mapped("string"), "text");
        assert_eq!(mapped("number"), "double");
        assert_eq!(mapped("boolean"), "boolean");
        assert_eq!(mapped("date"), "timestamp");
        assert_eq!(mapped("uuid"), "uuid");
        assert_eq!(mapped("timeuuid"), "timeuuid");
    }

    #[test]
    fn maps_collections_with_element_types() {
        assert_eq!(mapped("set:string"), "set<text>");
        assert_eq!(mapped("list:string"), "list<text>");
        assert_eq!(mapped("list:boolean"), "list<boolean>");
        assert_eq!(mapped("list:date"), "list<timestamp>");
        assert_eq!(mapped("map:number"), "map<text, double>");
        assert_eq!(mapped("map:timeuuid"), "map<text, timeuuid>");
    }

    #[test]
    fn opaque_and_unknown_types_fall_back_to_text() {
        for name in ["array", "hash", "reference", "untyped", "widget"] {
            assert_eq!(mapped(name), "text");
        }
    }

    #[test]
    fn rendered_types_parse_back() {
        for rendered in ["text", "set<uuid>", "list<timestamp>", "map<text, boolean>"] {
            let parsed = ColumnType::parse(rendered).expect("rendered type should parse");
            assert_eq!(parsed.to_string(), rendered);
        }
        assert_eq!(
            ColumnType::parse("map<text,double>"),
            Some(ColumnType::Map(Primitive::Text, Primitive::Double))
        );
        assert_eq!(ColumnType::parse("frozen<tuple>"), None);
    }
}
