//! Error taxonomy for the entity model.
//!
//! Domain methods and the repository contract fail fast with one of these;
//! nothing in the library swallows a failure or reports it out of band.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::status::{UnknownTagError, VersionStatus};
use crate::model::types::{ContentHash, InvalidValueError, VersionId};
use crate::store::StoreError;

/// Entity kinds named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Collection,
    File,
    Version,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Collection => "Collection",
            EntityKind::File => "LogicalFile",
            EntityKind::Version => "Version",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by entities, services and the repository contract.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {identifier}")]
    EntityNotFound {
        entity: EntityKind,
        identifier: String,
    },

    /// The name is already taken in its scope.
    #[error("{entity} already exists: {name}")]
    DuplicateName { entity: EntityKind, name: String },

    /// A version status change would move backward.
    #[error("cannot transition from {current} to {target}")]
    InvalidStatusTransition {
        current: VersionStatus,
        target: VersionStatus,
    },

    /// The caller supplied an unusable combination of arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Deletion is blocked by children that are not yet deleted.
    #[error("cannot delete {entity} '{name}': it still has live children")]
    DeleteConstraint { entity: EntityKind, name: String },

    /// Stored bytes do not match the recorded hash.
    #[error("integrity check failed for version {version} (expected {expected})")]
    Integrity {
        version: VersionId,
        expected: ContentHash,
    },

    /// Another writer took the version number first.
    #[error("version number {number} already allocated in file {file}")]
    VersionConflict { file: String, number: u32 },

    /// The content gateway failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The persistence engine failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ModelError {
    pub fn not_found(entity: EntityKind, identifier: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    pub fn duplicate(entity: EntityKind, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            entity,
            name: name.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// check if this error indicates the entity or its data doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            ModelError::EntityNotFound { .. } => true,
            ModelError::Gateway(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// check if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            ModelError::DuplicateName { .. } | ModelError::VersionConflict { .. } => true,
            ModelError::Store(e) => e.is_conflict(),
            _ => false,
        }
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        match self {
            ModelError::VersionConflict { .. } => true,
            ModelError::Store(e) => e.is_retriable(),
            _ => false,
        }
    }
}

impl From<InvalidValueError> for ModelError {
    fn from(err: InvalidValueError) -> Self {
        ModelError::InvalidArgument(err.to_string())
    }
}

impl From<UnknownTagError> for ModelError {
    fn from(err: UnknownTagError) -> Self {
        ModelError::InvalidArgument(err.to_string())
    }
}
