//! Named attachment blobs.
//!
//! Attachment data is base64 text at rest. The content type decides whether
//! decoded bytes are exposed as text or as raw binary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Separator between model key and attachment name in composite keys.
pub const KEY_DELIMITER: char = ':';

/// Builds the composite storage key `<model_key>:<name>`.
///
/// Collision-free only for model keys that do not themselves contain `:`.
pub fn attachment_key(model_key: &str, name: &str) -> String {
    format!("{model_key}{KEY_DELIMITER}{name}")
}

/// Decoded attachment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentBody {
    Text(String),
    Binary(Vec<u8>),
}

impl AttachmentBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<&str> for AttachmentBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttachmentBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for AttachmentBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub body: AttachmentBody,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<AttachmentBody>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Base64 form stored in the `data` column.
    pub fn encode_data(&self) -> String {
        STANDARD.encode(self.body.as_bytes())
    }

    /// Rebuilds an attachment from its stored columns.
    pub fn decode(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: &str,
    ) -> Result<Self, base64::DecodeError> {
        let content_type = content_type.into();
        let bytes = STANDARD.decode(data.trim())?;
        let body = if is_textual(&content_type) {
            AttachmentBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            AttachmentBody::Binary(bytes)
        };
        Ok(Self {
            name: name.into(),
            content_type,
            body,
        })
    }
}

fn is_textual(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/") || essence.ends_with("json") || essence.ends_with("xml")
}
