//! Error types for Clipdeck core.

use crate::entity::EntityId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the local, synchronous layer.
///
/// None of these are ever produced after an optimistic change has been
/// applied: every operation validates its input before returning the next
/// collection state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Caller input is structurally wrong.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Referenced entity does not exist in the collection.
    #[error("entity not found: {id}")]
    NotFound {
        /// The missing entity.
        id: EntityId,
    },

    /// An entity with the same id already exists in the collection.
    #[error("duplicate entity id: {id}")]
    DuplicateId {
        /// The duplicated id.
        id: EntityId,
    },

    /// Encoding error while measuring or fingerprinting state.
    #[error("codec error: {0}")]
    Codec(#[from] clipdeck_codec::CodecError),
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(id: EntityId) -> Self {
        Self::NotFound { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::invalid_argument("split point outside segment");
        assert_eq!(
            err.to_string(),
            "invalid argument: split point outside segment"
        );

        let id = EntityId::new();
        assert!(CoreError::not_found(id).to_string().contains(&id.to_string()));
    }
}
