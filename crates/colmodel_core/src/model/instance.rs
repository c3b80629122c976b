use super::attachment::Attachment;
use super::value::Value;
use super::{AttachmentBody, ModelError, ModelResult};
use crate::schema::{Schema, SchemaDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One key-addressed object described by a `Schema`.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    values: BTreeMap<String, Value>,
    pending_attachments: BTreeMap<String, Attachment>,
    dirty: bool,
    destroyed: bool,
    persisted: bool,
}

impl Model {
    /// Creates a clean instance holding fresh defaults for every property.
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = schema
            .property_types()
            .into_iter()
            .map(|(name, logical_type)| {
                (
                    name.to_string(),
                    schema.registry().default_value(logical_type),
                )
            })
            .collect();

        Self {
            schema,
            values,
            pending_attachments: BTreeMap::new(),
            dirty: false,
            destroyed: false,
            persisted: false,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Mutable access without validation; marks the instance dirty.
    ///
    /// Use `is_valid` to re-check after in-place edits.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let value = self.values.get_mut(name)?;
        self.dirty = true;
        Some(value)
    }

    /// Assigns one property after validating it against its logical type.
    ///
    /// # Errors
    /// - `UnknownProperty` when `name` is not declared.
    /// - `InvalidValue` when the validator rejects `value`; the stored value is
    ///   left unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let logical_type = self
            .schema
            .property_type(name)
            .ok_or_else(|| ModelError::UnknownProperty(name.to_string()))?;
        let value = value.into();
        if !self.schema.registry().validate(logical_type, &value) {
            return Err(ModelError::InvalidValue {
                property: name.to_string(),
                logical_type: logical_type.name(),
            });
        }

        self.values.insert(name.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    /// Assigns several properties; stops at the first rejected one.
    pub fn update<I, K>(&mut self, values: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (name, value) in values {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Key in text form, or `None` when unset.
    pub fn key(&self) -> Option<String> {
        match self.values.get(self.schema.key_field())? {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Number(number) if number.is_finite() => Some(render_number_key(*number)),
            _ => None,
        }
    }

    pub fn set_key(&mut self, key: impl Into<Value>) -> ModelResult<()> {
        let key_field = self.schema.key_field().to_string();
        self.set(&key_field, key)
    }

    /// Re-validates every property.
    pub fn is_valid(&self) -> bool {
        self.schema
            .property_types()
            .into_iter()
            .all(|(name, logical_type)| {
                let value = self.values.get(name).unwrap_or(&Value::Null);
                self.schema.registry().validate(logical_type, value)
            })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    /// True once the instance was loaded from or written to storage.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Loads values already known valid from storage.
    ///
    /// Skips undeclared names, runs no validators and marks the instance clean
    /// and persisted.
    pub fn restore_from_storage(&mut self, values: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in values {
            if self.schema.property_type(&name).is_some() {
                self.values.insert(name, value);
            }
        }
        self.dirty = false;
        self.persisted = true;
    }

    /// Queues an attachment for the next save.
    ///
    /// The content type comes from the attachment's declaration.
    pub fn set_attachment(&mut self, name: &str, body: impl Into<AttachmentBody>) -> ModelResult<()> {
        let content_type = self
            .schema
            .attachment_content_type(name)
            .ok_or_else(|| ModelError::UnknownAttachment(name.to_string()))?;
        let attachment = Attachment::new(name, content_type, body);
        self.pending_attachments.insert(name.to_string(), attachment);
        self.dirty = true;
        Ok(())
    }

    pub fn pending_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.pending_attachments.values()
    }

    pub fn take_pending_attachments(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.pending_attachments)
            .into_values()
            .collect()
    }
}

fn render_number_key(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Model;
    use crate::model::{AttachmentBody, ModelError, Value};
    use crate::schema::Schema;
    use crate::types::TypeRegistry;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Schema::builder(Arc::new(TypeRegistry::with_builtins()), "item", "items")
            .property("id", "uuid")
            .property("title", "string")
            .property("score", "number")
            .property("created", "date")
            .property("tags", "set:string")
            .property("history", "list:number")
            .property("meta", "map:string")
            .property("extra", "hash")
            .attachment("cover", "image/jpeg")
            .build()
            .expect("fixture schema")
    }

    #[test]
    fn new_instance_holds_type_defaults() {
        let model = Model::new(schema());
        assert_eq!(model.get("id"), Some(&Value::Null));
        assert_eq!(model.get("title"), Some(&Value::String(String::new())));
        assert_eq!(model.get("score"), Some(&Value::Number(0.0)));
        assert_eq!(
            model.get("created"),
            Some(&Value::Date(DateTime::<Utc>::default()))
        );
        assert_eq!(model.get("tags"), Some(&Value::List(Vec::new())));
        assert!(model.get("meta").and_then(Value::as_map).is_some_and(|map| map.is_empty()));
        assert!(!model.is_dirty());
        assert!(model.key().is_none());
    }

    #[test]
    fn defaults_are_not_shared_between_instances() {
        let schema = schema();
        let mut first = Model::new(Arc::clone(&schema));
        let second = Model::new(schema);
        first
            .get_mut("history")
            .and_then(Value::as_list_mut)
            .expect("history list")
            .push(Value::Number(1.0));
        assert_eq!(second.get("history"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn rejected_assignment_keeps_previous_value() {
        let mut model = Model::new(schema());
        model.set("title", "first").expect("string accepted");
        let err = model.set("title", 42).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidValue {
                property: "title".to_string(),
                logical_type: "string".to_string()
            }
        );
        assert_eq!(model.get("title"), Some(&Value::from("first")));
        assert!(matches!(
            model.set("missing", 1),
            Err(ModelError::UnknownProperty(_))
        ));
    }

    #[test]
    fn set_rejects_duplicates_and_in_place_edits_are_revalidated() {
        let mut model = Model::new(schema());
        assert!(model.set("tags", vec!["a", "a"]).is_err());
        model.set("tags", vec!["a", "b"]).expect("unique set accepted");
        assert!(model.is_valid());

        model
            .get_mut("tags")
            .and_then(Value::as_list_mut)
            .expect("tags list")
            .push(Value::from("a"));
        assert!(!model.is_valid());
    }

    #[test]
    fn key_reads_string_and_number_forms() {
        let mut model = Model::new(schema());
        model
            .set_key("6f1c7a52-3b0e-4c55-9d2c-0a1b2c3d4e5f")
            .expect("uuid key accepted");
        assert_eq!(model.key().as_deref(), Some("6f1c7a52-3b0e-4c55-9d2c-0a1b2c3d4e5f"));
        assert!(model.is_dirty());

        let numbered = Schema::builder(Arc::new(TypeRegistry::with_builtins()), "row", "rows")
            .property("id", "number")
            .build()
            .expect("numbered schema");
        let mut row = Model::new(numbered);
        row.set_key(7).expect("number key accepted");
        assert_eq!(row.key().as_deref(), Some("7"));
    }

    #[test]
    fn restore_skips_undeclared_names_and_marks_clean() {
        let mut model = Model::new(schema());
        model.set("title", "dirty").expect("string accepted");
        model.restore_from_storage(vec![
            ("title".to_string(), Value::from("stored")),
            ("ghost".to_string(), Value::from("ignored")),
        ]);
        assert_eq!(model.get("title"), Some(&Value::from("stored")));
        assert!(model.get("ghost").is_none());
        assert!(!model.is_dirty());
        assert!(model.is_persisted());
    }

    #[test]
    fn any_non_empty_string_counts_as_a_key() {
        let named = Schema::builder(Arc::new(TypeRegistry::with_builtins()), "tag", "tags")
            .property("id", "string")
            .build()
            .expect("string-keyed schema");
        let mut tag = Model::new(named);
        assert_eq!(tag.key(), None);
        tag.set_key(" ").expect("string key accepted");
        assert_eq!(tag.key().as_deref(), Some(" "));
        assert!(!tag.is_persisted());
    }

    #[test]
    fn attachments_take_declared_content_type() {
        let mut model = Model::new(schema());
        model
            .set_attachment("cover", vec![1u8, 2, 3])
            .expect("declared attachment");
        assert!(matches!(
            model.set_attachment("other", "x"),
            Err(ModelError::UnknownAttachment(_))
        ));

        let pending = model.take_pending_attachments();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content_type, "image/jpeg");
        assert_eq!(pending[0].body, AttachmentBody::Binary(vec![1, 2, 3]));
        assert_eq!(model.pending_attachments().count(), 0);
    }
}
