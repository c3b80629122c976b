use crate::codec::CodecError;
use crate::db::TransportError;
use crate::model::ModelError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors reported by adapter operations.
///
/// Caller errors (`MissingKey`, `AlreadyDestroyed`, `KeyInMerge`, `Model`) are
/// raised before any transport call.
#[derive(Debug)]
pub enum AdapterError {
    MissingKey { operation: &'static str },
    AlreadyDestroyed,
    KeyInMerge(String),
    Model(ModelError),
    Codec(CodecError),
    Transport(TransportError),
    CorruptAttachment { key: String, why: String },
}

impl AdapterError {
    /// Transport error carried by this error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingKey { .. } | Self::AlreadyDestroyed | Self::KeyInMerge(_) | Self::Model(_)
        )
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKey { operation } => write!(f, "cannot {operation} object without an id"),
            Self::AlreadyDestroyed => write!(f, "object already destroyed"),
            Self::KeyInMerge(field) => write!(f, "key field `{field}` cannot be merged"),
            Self::Model(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::CorruptAttachment { key, why } => {
                write!(f, "stored attachment `{key}` is corrupt: {why}")
            }
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for AdapterError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<CodecError> for AdapterError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<TransportError> for AdapterError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}
