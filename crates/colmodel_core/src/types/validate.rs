//! Built-in validators for the registered logical types.
//!
//! # Invariants
//! - `uuid` accepts versions 1 and 4; `timeuuid` accepts version 1 only.
//! - Collection validators accept null; element checks delegate to the scalar
//!   validator of the element type.
//! - Set uniqueness is decided by value equality.

use super::logical::{OpaqueType, ScalarType};
use crate::codec::date::coerce_timestamp;
use crate::model::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-f\d]{8}-[a-f\d]{4}-[14][a-f\d]{3}-[89ab][a-f\d]{3}-[a-f\d]{12}$")
        .expect("uuid pattern must compile")
});

static TIME_UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-f\d]{8}-[a-f\d]{4}-1[a-f\d]{3}-[89ab][a-f\d]{3}-[a-f\d]{12}$")
        .expect("timeuuid pattern must compile")
});

/// Returns the element validator for a scalar type.
pub fn scalar_validator(scalar: ScalarType) -> fn(&Value) -> bool {
    match scalar {
        ScalarType::String => is_string,
        ScalarType::Number => is_number,
        ScalarType::Boolean => is_boolean,
        ScalarType::Date => is_date,
        ScalarType::Uuid => is_uuid,
        ScalarType::TimeUuid => is_timeuuid,
    }
}

/// Returns the validator for an opaque blob type.
pub fn opaque_validator(opaque: OpaqueType) -> fn(&Value) -> bool {
    match opaque {
        OpaqueType::Array => is_array,
        OpaqueType::Hash | OpaqueType::Reference => is_hash,
        OpaqueType::Untyped => accept_any,
    }
}

pub fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

/// Finite numbers only; storage has no encoding for NaN or infinities.
pub fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(number) if number.is_finite())
}

pub fn is_boolean(value: &Value) -> bool {
    matches!(value, Value::Bool(_))
}

/// Dates, epoch milliseconds, and strings the date parser understands.
pub fn is_date(value: &Value) -> bool {
    match value {
        Value::Date(_) | Value::Number(_) | Value::String(_) => coerce_timestamp(value).is_some(),
        _ => false,
    }
}

pub fn is_uuid(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => UUID_PATTERN.is_match(text),
        _ => false,
    }
}

pub fn is_timeuuid(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => TIME_UUID_PATTERN.is_match(text),
        _ => false,
    }
}

pub fn is_array(value: &Value) -> bool {
    matches!(value, Value::Null | Value::List(_))
}

pub fn is_hash(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Map(_))
}

pub fn accept_any(_value: &Value) -> bool {
    true
}

/// `list:T`: null, or a sequence whose every element validates under `T`.
pub fn typed_list(element: ScalarType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::List(items) => items.iter().all(scalar_validator(element)),
        _ => false,
    }
}

/// `set:T`: like `list:T`, and no two elements are equal.
pub fn typed_set(element: ScalarType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::List(items) => {
            let has_duplicate = items
                .iter()
                .enumerate()
                .any(|(index, item)| items[..index].contains(item));
            !has_duplicate && items.iter().all(scalar_validator(element))
        }
        _ => false,
    }
}

/// `map:T`: null, or a mapping whose every value (not key) validates under `T`.
pub fn typed_map(element: ScalarType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Map(entries) => entries.values().all(scalar_validator(element)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_date, is_number, is_timeuuid, is_uuid, typed_list, typed_map, typed_set};
    use crate::model::value::Value;
    use crate::types::ScalarType;
    use std::collections::BTreeMap;

    const V1: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";
    const V4: &str = "11111111-2222-4333-8444-555555555555";

    #[test]
    fn uuid_accepts_versions_one_and_four_in_any_case() {
        assert!(is_uuid(&Value::from(V1)));
        assert!(is_uuid(&Value::from(V4)));
        assert!(is_uuid(&Value::from(V4.to_ascii_uppercase())));
        assert!(is_uuid(&Value::Null));
        assert!(!is_uuid(&Value::from("coati")));
        assert!(!is_uuid(&Value::from("11111111-2222-7333-8444-555555555555")));
    }

    #[test]
    fn timeuuid_requires_version_one() {
        assert!(is_timeuuid(&Value::from(V1)));
        assert!(is_timeuuid(&Value::Null));
        assert!(!is_timeuuid(&Value::from(V4)));
    }

    #[test]
    fn date_rejects_invalid_date_literal() {
        assert!(is_date(&Value::Number(1_154_415_600_000.0)));
        assert!(is_date(&Value::from("2013-07-08T00:00:00.000Z")));
        assert!(!is_date(&Value::from("Invalid Date")));
        assert!(!is_date(&Value::Null));
    }

    #[test]
    fn set_rejects_duplicates_and_accepts_deduplicated() {
        let with_duplicate = Value::from(vec!["cat", "dog", "coati", "coati"]);
        let unique = Value::from(vec!["cat", "dog", "coati"]);
        assert!(!typed_set(ScalarType::String, &with_duplicate));
        assert!(typed_set(ScalarType::String, &unique));
        assert!(typed_list(ScalarType::String, &with_duplicate));
    }

    #[test]
    fn list_checks_every_element() {
        let mut numbers = Value::from(vec![24, 47, 66]);
        assert!(typed_list(ScalarType::Number, &numbers));
        numbers.as_list_mut().unwrap().push(Value::from("71"));
        assert!(!typed_list(ScalarType::Number, &numbers));
    }

    #[test]
    fn numbers_must_be_finite() {
        assert!(is_number(&Value::Number(-0.5)));
        assert!(!is_number(&Value::Number(f64::NAN)));
        assert!(!is_number(&Value::Number(f64::INFINITY)));
        assert!(!typed_list(
            ScalarType::Number,
            &Value::from(vec![1.0, f64::NEG_INFINITY])
        ));
    }

    #[test]
    fn map_checks_values_not_keys() {
        let mut entries = BTreeMap::new();
        entries.insert("cat".to_string(), Value::Bool(true));
        entries.insert("dog".to_string(), Value::Bool(false));
        assert!(typed_map(ScalarType::Boolean, &Value::Map(entries.clone())));

        entries.insert("coati".to_string(), Value::Number(4.0));
        assert!(!typed_map(ScalarType::Boolean, &Value::Map(entries)));
    }
}
