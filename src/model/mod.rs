//! Entity model: collections, logical files and versions.
//!
//! Entities are plain data plus methods that take the repository (and, for
//! byte movement, the content gateway) as arguments. Nothing here holds a
//! connection.

mod collection;
mod error;
mod file;
mod repository;
mod status;
mod types;
mod version;

pub use collection::{Collection, FileLookup};
pub use error::{EntityKind, ModelError, ModelResult};
pub use file::{LogicalFile, NewVersion, VersionLookup, VersionSource, MAX_ALLOCATION_ATTEMPTS};
pub use repository::{Repository, DEFAULT_LINEAGE_DEPTH};
pub use status::{EntityStatus, StorageKind, UnknownTagError, VersionStatus};
pub use types::{
    now, CollectionId, ContentHash, FileId, InvalidValueError, Metadata, StorageAddress, VersionId,
    VersionNumber, DEFAULT_HASH_ALGORITHM,
};
pub use version::Version;
