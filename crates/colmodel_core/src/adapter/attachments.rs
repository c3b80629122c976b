//! Attachment side-table operations.
//!
//! Rows are keyed by `<model_key>:<name>`. Removing an attachment that was
//! never written is a no-op.

use super::{Adapter, AdapterError, AdapterResult};
use crate::db::{Assignment, BoundValue, ColumnValue, Filter, Statement};
use crate::model::{attachment_key, Attachment, AttachmentBody};
use crate::schema::SchemaDescriptor;
use futures::future::try_join_all;
use log::debug;

/// Primary key column of the attachment table.
pub const ATTACHMENT_KEY_COLUMN: &str = "key";
/// Attachment table layout; every column is text.
pub const ATTACHMENT_TABLE_COLUMNS: [&str; 4] = [ATTACHMENT_KEY_COLUMN, "name", "content_type", "data"];

impl Adapter {
    /// Writes one attachment, overwriting any previous body.
    pub async fn save_attachment(&self, model_key: &str, attachment: &Attachment) -> AdapterResult<()> {
        let key = attachment_key(model_key, &attachment.name);
        let values = vec![
            Assignment::new(ATTACHMENT_KEY_COLUMN, BoundValue::text(key.as_str())),
            Assignment::new("name", BoundValue::text(attachment.name.as_str())),
            Assignment::new("content_type", BoundValue::text(attachment.content_type.as_str())),
            Assignment::new("data", BoundValue::text(attachment.encode_data())),
        ];

        self.execute(Statement::Insert {
            keyspace: self.keyspace().to_string(),
            table: self.attachment_table.clone(),
            values,
        })
        .await?;
        debug!(
            "event=attachment_save module=adapter status=ok table={} bytes={}",
            self.attachment_table,
            attachment.body.as_bytes().len()
        );
        Ok(())
    }

    /// Writes several attachments concurrently; an empty slice sends nothing.
    pub async fn save_attachments(&self, model_key: &str, attachments: &[Attachment]) -> AdapterResult<()> {
        if attachments.is_empty() {
            return Ok(());
        }
        try_join_all(
            attachments
                .iter()
                .map(|attachment| self.save_attachment(model_key, attachment)),
        )
        .await?;
        Ok(())
    }

    /// Reads one attachment; `None` when it was never written.
    pub async fn fetch_attachment(&self, model_key: &str, name: &str) -> AdapterResult<Option<Attachment>> {
        let key = attachment_key(model_key, name);
        let rows = self
            .execute(Statement::Select {
                keyspace: self.keyspace().to_string(),
                table: self.attachment_table.clone(),
                filter: key_filter(&key),
            })
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let text = |column: &str| match row.get(column) {
            Some(ColumnValue::Text(text)) => Some(text.as_str()),
            _ => None,
        };
        let stored_name = text("name").unwrap_or(name);
        let content_type = text("content_type").unwrap_or_default();
        let data = text("data").unwrap_or_default();

        Attachment::decode(stored_name, content_type, data)
            .map(Some)
            .map_err(|err| AdapterError::CorruptAttachment {
                key,
                why: err.to_string(),
            })
    }

    /// Body of one attachment; `None` when it was never written.
    pub async fn attachment(&self, model_key: &str, name: &str) -> AdapterResult<Option<AttachmentBody>> {
        Ok(self
            .fetch_attachment(model_key, name)
            .await?
            .map(|attachment| attachment.body))
    }

    pub async fn remove_attachment(&self, model_key: &str, name: &str) -> AdapterResult<()> {
        let key = attachment_key(model_key, name);
        self.execute(Statement::Delete {
            keyspace: self.keyspace().to_string(),
            table: self.attachment_table.clone(),
            filter: key_filter(&key),
        })
        .await?;
        Ok(())
    }

    /// Removes every attachment name declared for the model type, whether or
    /// not it was ever written.
    pub async fn remove_all_attachments(&self, model_key: &str) -> AdapterResult<()> {
        let names = self.schema.attachment_names();
        if names.is_empty() {
            return Ok(());
        }
        try_join_all(
            names
                .into_iter()
                .map(|name| self.remove_attachment(model_key, name)),
        )
        .await?;
        Ok(())
    }
}

fn key_filter(key: &str) -> Filter {
    Filter::Eq {
        column: ATTACHMENT_KEY_COLUMN.to_string(),
        value: BoundValue::text(key),
    }
}
