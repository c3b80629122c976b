//! Explicit logical type registry.
//!
//! # Responsibility
//! - Hold every usable logical type with its default function and validator.
//! - Resolve declared type names for schema construction.
//!
//! # Invariants
//! - Defaults are functions evaluated once per new instance, so instances never
//!   share mutable default state.
//! - A name is registered at most once.

use super::logical::{LogicalType, OpaqueType, ScalarType};
use super::validate::{opaque_validator, scalar_validator, typed_list, typed_map, typed_set};
use super::{TypeError, TypeResult};
use crate::model::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Produces a fresh default value for a new instance.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;
/// Accepts or rejects a candidate value.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One registered logical type.
#[derive(Clone)]
pub struct TypeDefinition {
    logical_type: LogicalType,
    default: DefaultFn,
    validator: Validator,
}

impl TypeDefinition {
    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    pub fn default_value(&self) -> Value {
        (self.default)()
    }

    pub fn validate(&self, value: &Value) -> bool {
        (self.validator)(value)
    }
}

impl Debug for TypeDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("logical_type", &self.logical_type)
            .finish_non_exhaustive()
    }
}

/// Registry of logical types, constructed once and shared by reference.
#[derive(Clone, Default, Debug)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDefinition>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in type.
    ///
    /// Built-ins: the six scalars, `list:T` and `map:T` for every scalar,
    /// `set:T` for every scalar except `boolean`, and the opaque blob types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Registers one type by name.
    ///
    /// # Errors
    /// - `InvalidTypeName` when `name` is not a well-formed type name.
    /// - `DuplicateType` when `name` is already registered.
    pub fn register<D, V>(
        &mut self,
        name: &str,
        default: D,
        validator: V,
    ) -> TypeResult<LogicalType>
    where
        D: Fn() -> Value + Send + Sync + 'static,
        V: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let logical_type = LogicalType::parse(name)?;
        let key = logical_type.name();
        if self.types.contains_key(key.as_str()) {
            return Err(TypeError::DuplicateType(key));
        }

        self.types.insert(
            key,
            TypeDefinition {
                logical_type: logical_type.clone(),
                default: Arc::new(default),
                validator: Arc::new(validator),
            },
        );
        Ok(logical_type)
    }

    /// Resolves a declared type name to a registered logical type.
    pub fn resolve(&self, name: &str) -> TypeResult<LogicalType> {
        let logical_type = LogicalType::parse(name)?;
        if !self.types.contains_key(logical_type.name().as_str()) {
            return Err(TypeError::UnknownType(name.trim().to_string()));
        }
        Ok(logical_type)
    }

    pub fn definition(&self, logical_type: &LogicalType) -> Option<&TypeDefinition> {
        self.types.get(logical_type.name().as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Evaluates the default function of `logical_type`, or null when unknown.
    pub fn default_value(&self, logical_type: &LogicalType) -> Value {
        self.definition(logical_type)
            .map_or(Value::Null, TypeDefinition::default_value)
    }

    /// Runs the validator of `logical_type`. Unknown types reject everything.
    pub fn validate(&self, logical_type: &LogicalType, value: &Value) -> bool {
        self.definition(logical_type)
            .is_some_and(|definition| definition.validate(value))
    }

    /// Returns registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn register_builtins(&mut self) {
        for scalar in ScalarType::ALL {
            self.insert_builtin(
                LogicalType::Scalar(scalar),
                Arc::new(move || scalar_default(scalar)),
                Arc::new(scalar_validator(scalar)),
            );
            self.insert_builtin(
                LogicalType::List(scalar),
                Arc::new(|| Value::List(Vec::new())),
                Arc::new(move |value: &Value| typed_list(scalar, value)),
            );
            self.insert_builtin(
                LogicalType::Map(scalar),
                Arc::new(|| Value::Map(BTreeMap::new())),
                Arc::new(move |value: &Value| typed_map(scalar, value)),
            );
            if scalar != ScalarType::Boolean {
                self.insert_builtin(
                    LogicalType::Set(scalar),
                    Arc::new(|| Value::List(Vec::new())),
                    Arc::new(move |value: &Value| typed_set(scalar, value)),
                );
            }
        }

        for opaque in [
            OpaqueType::Array,
            OpaqueType::Hash,
            OpaqueType::Reference,
            OpaqueType::Untyped,
        ] {
            self.insert_builtin(
                LogicalType::Opaque(opaque),
                Arc::new(move || opaque_default(opaque)),
                Arc::new(opaque_validator(opaque)),
            );
        }
    }

    fn insert_builtin(&mut self, logical_type: LogicalType, default: DefaultFn, validator: Validator) {
        self.types.insert(
            logical_type.name(),
            TypeDefinition {
                logical_type,
                default,
                validator,
            },
        );
    }
}

fn scalar_default(scalar: ScalarType) -> Value {
    match scalar {
        ScalarType::String => Value::String(String::new()),
        ScalarType::Number => Value::Number(0.0),
        ScalarType::Boolean => Value::Bool(false),
        ScalarType::Date => Value::Date(DateTime::<Utc>::default()),
        ScalarType::Uuid | ScalarType::TimeUuid => Value::Null,
    }
}

fn opaque_default(opaque: OpaqueType) -> Value {
    match opaque {
        OpaqueType::Array => Value::List(Vec::new()),
        OpaqueType::Hash | OpaqueType::Reference => Value::Map(BTreeMap::new()),
        OpaqueType::Untyped => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::TypeRegistry;
    use crate::model::value::Value;
    use crate::types::{LogicalType, ScalarType, TypeError};

    #[test]
    fn builtins_cover_collections_except_boolean_sets() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.contains("list:boolean"));
        assert!(registry.contains("map:boolean"));
        assert!(registry.contains("set:timeuuid"));
        assert!(!registry.contains("set:boolean"));
        // 6 scalars + 6 lists + 6 maps + 5 sets + 4 opaque types.
        assert_eq!(registry.len(), 27);
    }

    #[test]
    fn defaults_are_fresh_per_evaluation() {
        let registry = TypeRegistry::with_builtins();
        let list_type = LogicalType::List(ScalarType::String);

        let mut first = registry.default_value(&list_type);
        first.as_list_mut().unwrap().push(Value::from("mutated"));
        let second = registry.default_value(&list_type);

        assert_eq!(second, Value::List(Vec::new()));
        assert_eq!(registry.default_value(&LogicalType::Scalar(ScalarType::Uuid)), Value::Null);
    }

    #[test]
    fn custom_types_register_once() {
        let mut registry = TypeRegistry::new();
        let registered = registry
            .register("percent", || Value::Number(0.0), |value| {
                value.as_f64().is_some_and(|n| (0.0..=100.0).contains(&n))
            })
            .expect("custom type should register");
        assert_eq!(registered, LogicalType::Custom("percent".to_string()));
        assert!(registry.validate(&registered, &Value::Number(42.0)));
        assert!(!registry.validate(&registered, &Value::Number(142.0)));

        let duplicate = registry.register("percent", || Value::Null, |_| true);
        assert_eq!(duplicate, Err(TypeError::DuplicateType("percent".to_string())));
    }

    #[test]
    fn resolve_rejects_unregistered_names() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(
            registry.resolve("set:boolean"),
            Err(TypeError::UnknownType("set:boolean".to_string()))
        );
        assert!(!registry.validate(
            &LogicalType::Custom("widget".to_string()),
            &Value::Null
        ));
    }
}
