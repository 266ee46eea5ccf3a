use crate::{codec::CodecError, engine::EngineError, resource::LeakError};
use thiserror::Error as ThisError;

///
/// Error
///
/// Every failure the store layer can surface. Collaborator failures keep
/// their source; missing keys are never errors.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{name} has been closed")]
    ResourceClosed { name: String },

    #[error(transparent)]
    Leak(#[from] LeakError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("index '{index}' is not declared on '{type_name}'")]
    UnknownIndex {
        type_name: &'static str,
        index: String,
    },

    #[error("type tag {tag} has no registered decoder")]
    UnregisteredType { tag: u32 },

    #[error("corrupted {what}: {message}")]
    Corruption { what: &'static str, message: String },
}

impl Error {
    pub(crate) fn closed(name: impl Into<String>) -> Self {
        Self::ResourceClosed { name: name.into() }
    }

    pub(crate) fn corruption(what: &'static str, message: impl Into<String>) -> Self {
        Self::Corruption {
            what,
            message: message.into(),
        }
    }

    /// Whether this error reports use of a closed resource.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::ResourceClosed { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
