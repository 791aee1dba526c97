//! The persistence contract between the entity model and storage.
//!
//! Entities never hold a repository; every method that needs persistence
//! takes a `&dyn Repository` argument. Implementations use interior
//! mutability so one handle can be shared by reference.

use crate::model::collection::Collection;
use crate::model::error::ModelResult;
use crate::model::file::LogicalFile;
use crate::model::types::{CollectionId, FileId, VersionId, VersionNumber};
use crate::model::version::Version;

/// Default number of versions a lineage query walks.
pub const DEFAULT_LINEAGE_DEPTH: usize = 100;

/// All persistence operations the model relies on.
///
/// Lookups return `Ok(None)` for a missing entity; only the entity methods
/// turn absence into [`ModelError::EntityNotFound`](crate::model::ModelError).
pub trait Repository {
    // ==================== Collections ====================

    /// Persist a new collection.
    ///
    /// Fails with `DuplicateName` if another collection has the same name.
    fn add_collection(&self, collection: &Collection) -> ModelResult<()>;

    fn get_collection(&self, id: &CollectionId) -> ModelResult<Option<Collection>>;

    fn get_collection_by_name(&self, name: &str) -> ModelResult<Option<Collection>>;

    /// List collections ordered by name.
    fn list_collections(&self, include_deleted: bool) -> ModelResult<Vec<Collection>>;

    /// Write back a collection's mutable fields.
    fn update_collection(&self, collection: &Collection) -> ModelResult<()>;

    // ==================== Files ====================

    /// Persist a new file.
    ///
    /// Fails with `DuplicateName` if its collection already has a file of
    /// the same name.
    fn add_file(&self, file: &LogicalFile) -> ModelResult<()>;

    fn get_file(&self, id: &FileId) -> ModelResult<Option<LogicalFile>>;

    fn get_file_by_name(
        &self,
        collection_id: &CollectionId,
        name: &str,
    ) -> ModelResult<Option<LogicalFile>>;

    /// List the files of a collection ordered by name.
    fn list_files(
        &self,
        collection_id: &CollectionId,
        include_deleted: bool,
    ) -> ModelResult<Vec<LogicalFile>>;

    fn update_file(&self, file: &LogicalFile) -> ModelResult<()>;

    // ==================== Versions ====================

    /// Persist a new version.
    ///
    /// Fails with `VersionConflict` if its number is already taken in the
    /// file.
    fn add_version(&self, version: &Version) -> ModelResult<()>;

    fn get_version(&self, id: &VersionId) -> ModelResult<Option<Version>>;

    /// Look up a version by number, whatever its status.
    fn get_version_by_number(
        &self,
        file_id: &FileId,
        number: VersionNumber,
    ) -> ModelResult<Option<Version>>;

    /// Highest-numbered COMMITTED version of a file.
    fn latest_version(&self, file_id: &FileId) -> ModelResult<Option<Version>>;

    /// List the versions of a file ordered by version number.
    fn list_versions(&self, file_id: &FileId, include_deleted: bool) -> ModelResult<Vec<Version>>;

    fn update_version(&self, version: &Version) -> ModelResult<()>;

    /// `max(version_number) + 1` for the file, or 1 when it has none.
    fn next_version_number(&self, file_id: &FileId) -> ModelResult<VersionNumber>;

    // ==================== Lineage ====================

    /// Follow `source_version_id` pointers from `version_id`, newest first.
    ///
    /// Returns at most `max_depth` versions (the start version is always
    /// included when it exists), stops at a missing referent, and visits
    /// each version at most once. An unknown start id yields an empty list.
    fn query_lineage(&self, version_id: &VersionId, max_depth: usize) -> ModelResult<Vec<Version>>;

    // ==================== Lifecycle ====================

    /// Release held resources. Safe to call repeatedly.
    fn close(&self) -> ModelResult<()>;
}
