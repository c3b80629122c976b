use super::date::coerce_timestamp;
use super::{CodecError, CodecResult};
use crate::db::{Assignment, BoundValue, ColumnValue};
use crate::model::{Attachment, Model, Value};
use crate::schema::SchemaDescriptor;
use crate::types::{column_type_for, LogicalType, ScalarType};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Write-ready form of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedModel {
    /// Column assignments in declaration order; omitted columns are absent.
    pub columns: Vec<Assignment>,
    /// Set and map columns left out of `columns` because they are empty.
    pub elided: Vec<String>,
    /// Attachments queued on the instance.
    pub attachments: Vec<Attachment>,
}

impl SerializedModel {
    pub fn column(&self, name: &str) -> Option<&BoundValue> {
        self.columns
            .iter()
            .find(|assignment| assignment.column == name)
            .map(|assignment| &assignment.value)
    }
}

/// Flattens an instance into column assignments.
///
/// Empty sets and maps are left out of the result. Key presence is checked by
/// the caller before this runs.
pub fn serialize_model(model: &Model) -> CodecResult<SerializedModel> {
    let schema = model.schema();
    let mut columns = Vec::new();
    let mut elided = Vec::new();

    for (name, logical_type) in schema.property_types() {
        let value = model.get(name).unwrap_or(&Value::Null);
        if is_elided(logical_type, value) {
            elided.push(name.to_string());
            continue;
        }
        columns.push(Assignment::new(name, encode_value(name, logical_type, value)?));
    }

    Ok(SerializedModel {
        columns,
        elided,
        attachments: model.pending_attachments().cloned().collect(),
    })
}

/// Encodes one property value for its column.
///
/// An empty set or map encodes as null here; `serialize_model` omits it
/// instead.
pub fn encode_value(property: &str, logical_type: &LogicalType, value: &Value) -> CodecResult<BoundValue> {
    let column_type = column_type_for(logical_type);
    let encoded = match logical_type {
        LogicalType::Opaque(_) | LogicalType::Custom(_) => {
            ColumnValue::Text(value.to_json().to_string())
        }
        LogicalType::Scalar(scalar) => {
            if value.is_null() {
                ColumnValue::Null
            } else {
                encode_scalar(property, *scalar, value)?
            }
        }
        LogicalType::List(element) => ColumnValue::List(encode_items(property, *element, value)?),
        LogicalType::Set(element) => {
            let items = encode_items(property, *element, value)?;
            if items.is_empty() {
                ColumnValue::Null
            } else {
                ColumnValue::Set(items)
            }
        }
        LogicalType::Map(element) => {
            let entries = match value {
                Value::Null => BTreeMap::new(),
                Value::Map(entries) => entries
                    .iter()
                    .map(|(key, item)| {
                        encode_element(property, *element, item).map(|encoded| (key.clone(), encoded))
                    })
                    .collect::<CodecResult<BTreeMap<_, _>>>()?,
                _ => return Err(unencodable(property, logical_type)),
            };
            if entries.is_empty() {
                ColumnValue::Null
            } else {
                ColumnValue::Map(entries)
            }
        }
    };
    Ok(BoundValue::new(column_type, encoded))
}

/// Encodes a key given in text form for the key column.
pub fn encode_key(logical_type: &LogicalType, key: &str) -> CodecResult<BoundValue> {
    let value = match logical_type {
        LogicalType::Scalar(ScalarType::Number) => key
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| CodecError::InvalidKey(key.to_string()))?,
        _ => Value::String(key.to_string()),
    };
    let bound = encode_value("key", logical_type, &value)
        .map_err(|_| CodecError::InvalidKey(key.to_string()))?;
    if bound.value.is_null() || bound.column_type.is_collection() {
        return Err(CodecError::InvalidKey(key.to_string()));
    }
    Ok(bound)
}

fn is_elided(logical_type: &LogicalType, value: &Value) -> bool {
    match logical_type {
        LogicalType::Set(_) => value.is_null() || value.as_list().is_some_and(<[Value]>::is_empty),
        LogicalType::Map(_) => value.is_null() || value.as_map().is_some_and(BTreeMap::is_empty),
        _ => false,
    }
}

fn encode_items(property: &str, element: ScalarType, value: &Value) -> CodecResult<Vec<ColumnValue>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::List(items) => items
            .iter()
            .map(|item| encode_element(property, element, item))
            .collect(),
        _ => Err(CodecError::Unencodable {
            property: property.to_string(),
            logical_type: format!("collection of {}", element.as_str()),
        }),
    }
}

fn encode_element(property: &str, element: ScalarType, value: &Value) -> CodecResult<ColumnValue> {
    if value.is_null() {
        return Err(CodecError::NullElement {
            property: property.to_string(),
        });
    }
    encode_scalar(property, element, value)
}

fn encode_scalar(property: &str, scalar: ScalarType, value: &Value) -> CodecResult<ColumnValue> {
    let mismatch = || unencodable(property, &LogicalType::Scalar(scalar));
    match scalar {
        ScalarType::String => value
            .as_str()
            .map(|text| ColumnValue::Text(text.to_string()))
            .ok_or_else(mismatch),
        ScalarType::Number => value.as_f64().map(ColumnValue::Double).ok_or_else(mismatch),
        ScalarType::Boolean => value.as_bool().map(ColumnValue::Boolean).ok_or_else(mismatch),
        ScalarType::Date => coerce_timestamp(value)
            .map(ColumnValue::Timestamp)
            .ok_or_else(|| CodecError::InvalidDate {
                property: property.to_string(),
            }),
        ScalarType::Uuid | ScalarType::TimeUuid => value
            .as_str()
            .and_then(|text| Uuid::parse_str(text.trim()).ok())
            .map(ColumnValue::Uuid)
            .ok_or_else(|| CodecError::InvalidUuid {
                property: property.to_string(),
            }),
    }
}

fn unencodable(property: &str, logical_type: &LogicalType) -> CodecError {
    CodecError::Unencodable {
        property: property.to_string(),
        logical_type: logical_type.name(),
    }
}
