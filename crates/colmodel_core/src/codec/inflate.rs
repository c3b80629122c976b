use super::date::{coerce_date, date_from_millis};
use crate::db::{ColumnValue, Row};
use crate::model::{Model, Value};
use crate::schema::{Schema, SchemaDescriptor};
use crate::types::{LogicalType, ScalarType};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rebuilds an instance from a raw row.
///
/// `None` produces no instance. Columns without a declared property are
/// skipped; the result is clean.
pub fn inflate_row(schema: &Arc<Schema>, row: Option<&Row>) -> Option<Model> {
    let row = row?;
    let mut model = Model::new(Arc::clone(schema));
    let mut restored = Vec::with_capacity(row.len());

    for (column, raw) in row {
        match schema.property_type(column) {
            Some(logical_type) => {
                restored.push((column.clone(), decode_value(logical_type, raw)));
            }
            None => debug!(
                "event=inflate_skip module=codec status=ok table={} column={}",
                schema.plural(),
                column
            ),
        }
    }

    model.restore_from_storage(restored);
    Some(model)
}

/// Decodes one stored column value for its logical type.
///
/// Never fails: opaque columns holding malformed JSON decode to the raw text.
pub fn decode_value(logical_type: &LogicalType, raw: &ColumnValue) -> Value {
    match logical_type {
        LogicalType::Opaque(_) | LogicalType::Custom(_) => match raw {
            ColumnValue::Text(text) => serde_json::from_str(text)
                .map(Value::from_json)
                .unwrap_or_else(|_| Value::String(text.clone())),
            other => decode_plain(other),
        },
        LogicalType::Scalar(scalar) => decode_scalar(*scalar, raw),
        LogicalType::List(element) | LogicalType::Set(element) => match raw {
            ColumnValue::List(items) | ColumnValue::Set(items) => Value::List(
                items
                    .iter()
                    .map(|item| decode_scalar(*element, item))
                    .collect(),
            ),
            ColumnValue::Null => Value::List(Vec::new()),
            other => Value::List(vec![decode_scalar(*element, other)]),
        },
        LogicalType::Map(element) => match raw {
            ColumnValue::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), decode_scalar(*element, item)))
                    .collect(),
            ),
            ColumnValue::Null => Value::Map(BTreeMap::new()),
            other => {
                debug!(
                    "event=inflate_map_fallback module=codec status=ok found={:?}",
                    other
                );
                Value::Map(BTreeMap::new())
            }
        },
    }
}

fn decode_scalar(scalar: ScalarType, raw: &ColumnValue) -> Value {
    match (scalar, raw) {
        (_, ColumnValue::Null) => Value::Null,
        (ScalarType::Date, ColumnValue::Timestamp(millis)) => {
            date_from_millis(*millis).map_or(Value::Null, Value::Date)
        }
        (ScalarType::Date, ColumnValue::Double(millis)) => {
            coerce_date(&Value::Number(*millis)).map_or(Value::Null, Value::Date)
        }
        (ScalarType::Date, ColumnValue::Text(text)) => {
            coerce_date(&Value::String(text.clone())).map_or_else(|| Value::String(text.clone()), Value::Date)
        }
        (ScalarType::Uuid | ScalarType::TimeUuid, ColumnValue::Uuid(id)) => {
            Value::String(id.to_string())
        }
        (_, other) => decode_plain(other),
    }
}

/// Storage value to the nearest property value, without type direction.
fn decode_plain(raw: &ColumnValue) -> Value {
    match raw {
        ColumnValue::Null => Value::Null,
        ColumnValue::Text(text) => Value::String(text.clone()),
        ColumnValue::Double(number) => Value::Number(*number),
        ColumnValue::Boolean(flag) => Value::Bool(*flag),
        ColumnValue::Timestamp(millis) => date_from_millis(*millis).map_or(Value::Null, Value::Date),
        ColumnValue::Uuid(id) => Value::String(id.to_string()),
        ColumnValue::List(items) | ColumnValue::Set(items) => {
            Value::List(items.iter().map(decode_plain).collect())
        }
        ColumnValue::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), decode_plain(item)))
                .collect(),
        ),
    }
}
