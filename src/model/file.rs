//! Logical files and version allocation.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gateway::{ContentGateway, TransferOptions};
use crate::model::error::{EntityKind, ModelError, ModelResult};
use crate::model::repository::Repository;
use crate::model::status::{EntityStatus, StorageKind};
use crate::model::types::{self, CollectionId, ContentHash, FileId, Metadata, StorageAddress, VersionId, VersionNumber};
use crate::model::version::Version;

/// How many times `add_version` re-allocates a number taken by a concurrent
/// writer before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// How to pick one version out of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLookup<'a> {
    Number(VersionNumber),
    Id(&'a VersionId),
}

impl<'a> VersionLookup<'a> {
    /// Build a lookup from two optional keys, exactly one of which must be
    /// set.
    pub fn from_parts(number: Option<VersionNumber>, id: Option<&'a VersionId>) -> ModelResult<Self> {
        match (number, id) {
            (Some(number), None) => Ok(VersionLookup::Number(number)),
            (None, Some(id)) => Ok(VersionLookup::Id(id)),
            (Some(_), Some(_)) => Err(ModelError::invalid_argument(
                "give either a version number or a version id, not both",
            )),
            (None, None) => Err(ModelError::invalid_argument(
                "a version number or a version id is required",
            )),
        }
    }
}

/// Where a new version's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// Local data to push through the gateway.
    Path(PathBuf),
    /// A hash computed elsewhere; nothing is pushed.
    Hash(ContentHash),
}

impl VersionSource {
    /// Build a source from two optional inputs, exactly one of which must be
    /// set.
    pub fn from_parts(path: Option<PathBuf>, hash: Option<ContentHash>) -> ModelResult<Self> {
        match (path, hash) {
            (Some(path), None) => Ok(VersionSource::Path(path)),
            (None, Some(hash)) => Ok(VersionSource::Hash(hash)),
            (Some(_), Some(_)) => Err(ModelError::invalid_argument(
                "give either a source path or a precomputed hash, not both",
            )),
            (None, None) => Err(ModelError::invalid_argument(
                "a source path or a precomputed hash is required",
            )),
        }
    }
}

/// Everything needed to create a version, apart from its number.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub source: VersionSource,
    pub kind: StorageKind,
    pub address: StorageAddress,
    pub source_version_id: Option<VersionId>,
    pub transformer: String,
    pub metadata: Metadata,
    pub options: TransferOptions,
}

impl NewVersion {
    pub fn new(source: VersionSource) -> Self {
        Self {
            source,
            kind: StorageKind::default(),
            address: StorageAddress::default(),
            source_version_id: None,
            transformer: String::new(),
            metadata: Metadata::new(),
            options: TransferOptions::new(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(VersionSource::Path(path.into()))
    }

    pub fn from_hash(hash: ContentHash) -> Self {
        Self::new(VersionSource::Hash(hash))
    }

    pub fn kind(mut self, kind: StorageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = StorageAddress::new(address);
        self
    }

    /// Record the version this one was derived from.
    pub fn derived_from(mut self, id: VersionId) -> Self {
        self.source_version_id = Some(id);
        self
    }

    pub fn transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = transformer.into();
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn transfer_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }
}

/// A named file within a collection, owning a numbered series of versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalFile {
    pub id: FileId,
    pub collection_id: CollectionId,
    /// Unique within the collection.
    pub name: String,
    pub description: String,
    pub owner: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalFile {
    pub fn new(collection_id: CollectionId, name: impl Into<String>) -> Self {
        let now = types::now();
        Self {
            id: FileId::generate(),
            collection_id,
            name: name.into(),
            description: String::new(),
            owner: String::new(),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    /// Flip to DELETED in memory; the caller persists.
    pub(crate) fn mark_deleted(&mut self) {
        if !self.is_deleted() {
            self.status = EntityStatus::Deleted;
            self.updated_at = types::now();
        }
    }

    // ==================== Versions ====================

    /// Allocate the next number, commit the content and persist the version.
    ///
    /// A path source is pushed through the gateway exactly once; a hash
    /// source never touches it. If a concurrent writer takes the number
    /// between allocation and insert, a fresh number is allocated and the
    /// insert retried.
    pub fn add_version(
        &self,
        repo: &dyn Repository,
        gateway: &dyn ContentGateway,
        new: NewVersion,
    ) -> ModelResult<Version> {
        let number = repo.next_version_number(&self.id)?;
        let mut version = Version::new(self.id.clone(), number, new.kind);
        version.address = new.address;
        version.source_version_id = new.source_version_id;
        version.transformer = new.transformer;
        version.metadata = new.metadata;

        match new.source {
            VersionSource::Path(path) => version.save(gateway, &path, &new.options)?,
            VersionSource::Hash(hash) => version.commit_with_hash(hash)?,
        }

        let mut attempt = 1;
        loop {
            match repo.add_version(&version) {
                Ok(()) => break,
                Err(ModelError::VersionConflict { number, .. }) if attempt < MAX_ALLOCATION_ATTEMPTS => {
                    attempt += 1;
                    version.version_number = repo.next_version_number(&self.id)?;
                    debug!(
                        file = %self.id,
                        taken = number,
                        retry = %version.version_number,
                        "version number taken, retrying"
                    );
                }
                Err(err) => {
                    if err.is_conflict() {
                        warn!(file = %self.id, attempts = attempt, "gave up allocating a version number");
                    }
                    return Err(err);
                }
            }
        }

        debug!(file = %self.name, version = %version.version_number, hash = %version.hash, "added version");
        Ok(version)
    }

    /// Fetch one version by number or id, whatever its status.
    pub fn get_version(&self, repo: &dyn Repository, lookup: VersionLookup<'_>) -> ModelResult<Version> {
        let found = match lookup {
            VersionLookup::Number(number) => repo.get_version_by_number(&self.id, number)?,
            VersionLookup::Id(id) => repo
                .get_version(id)?
                .filter(|version| version.file_id == self.id),
        };
        found.ok_or_else(|| {
            let identifier = match lookup {
                VersionLookup::Number(number) => format!("{}@v{}", self.name, number),
                VersionLookup::Id(id) => id.to_string(),
            };
            ModelError::not_found(EntityKind::Version, identifier)
        })
    }

    /// Highest-numbered COMMITTED version.
    pub fn latest_version(&self, repo: &dyn Repository) -> ModelResult<Version> {
        repo.latest_version(&self.id)?.ok_or_else(|| {
            ModelError::not_found(EntityKind::Version, format!("committed version of {}", self.name))
        })
    }

    /// Versions ordered by number.
    pub fn list_versions(&self, repo: &dyn Repository, include_deleted: bool) -> ModelResult<Vec<Version>> {
        repo.list_versions(&self.id, include_deleted)
    }

    /// Soft-delete one version.
    pub fn delete_version(&self, repo: &dyn Repository, number: VersionNumber) -> ModelResult<Version> {
        let mut version = self.get_version(repo, VersionLookup::Number(number))?;
        version.mark_deleted()?;
        repo.update_version(&version)?;
        Ok(version)
    }

    /// Soft-delete every version that is not already DELETED.
    pub fn delete_all_versions(&self, repo: &dyn Repository) -> ModelResult<usize> {
        let mut count = 0;
        for mut version in repo.list_versions(&self.id, false)? {
            version.mark_deleted()?;
            repo.update_version(&version)?;
            count += 1;
        }
        Ok(count)
    }

    /// True when every version is DELETED, or there are none.
    pub fn can_delete(&self, repo: &dyn Repository) -> ModelResult<bool> {
        Ok(repo
            .list_versions(&self.id, true)?
            .iter()
            .all(Version::is_deleted))
    }

    /// Soft-delete this file, refusing while any version is still live.
    pub fn delete(&mut self, repo: &dyn Repository) -> ModelResult<()> {
        if !self.can_delete(repo)? {
            return Err(ModelError::DeleteConstraint {
                entity: EntityKind::File,
                name: self.name.clone(),
            });
        }
        self.mark_deleted();
        repo.update_file(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::model::{Collection, VersionStatus};
    use crate::store::SqliteRepository;
    use proptest::prelude::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn setup() -> (SqliteRepository, MemoryGateway, LogicalFile) {
        let repo = SqliteRepository::in_memory();
        let collection = Collection::new("cifar");
        repo.add_collection(&collection).unwrap();
        let file = collection.add_child(&repo, "train.csv", "", "").unwrap();
        (repo, MemoryGateway::new(), file)
    }

    fn add_hashed(repo: &SqliteRepository, gateway: &MemoryGateway, file: &LogicalFile, hash: &str) -> Version {
        file.add_version(repo, gateway, NewVersion::from_hash(ContentHash::md5(hash)))
            .unwrap()
    }

    #[test]
    fn test_first_version_is_one() {
        let (repo, gateway, file) = setup();
        assert_eq!(repo.next_version_number(&file.id).unwrap(), VersionNumber::FIRST);

        let v1 = add_hashed(&repo, &gateway, &file, "aaa");
        assert_eq!(v1.version_number.get(), 1);
        assert_eq!(repo.next_version_number(&file.id).unwrap().get(), 2);
    }

    #[test]
    fn test_hash_source_never_pushes() {
        let (repo, gateway, file) = setup();
        let v = add_hashed(&repo, &gateway, &file, "abc123");

        assert_eq!(gateway.push_count(), 0);
        assert_eq!(v.status, VersionStatus::Committed);
        assert_eq!(v.hash, ContentHash::md5("abc123"));
    }

    #[test]
    fn test_path_source_pushes_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("train.csv");
        std::fs::write(&source, b"a,b\n").unwrap();
        let (repo, gateway, file) = setup();

        let v = file
            .add_version(&repo, &gateway, NewVersion::from_path(&source).kind(StorageKind::Gcs))
            .unwrap();

        assert_eq!(gateway.push_count(), 1);
        assert_eq!(v.hash, MemoryGateway::hash_bytes(b"a,b\n"));
        assert_eq!(v.kind, StorageKind::Gcs);

        let stored = repo.get_version(&v.id).unwrap().unwrap();
        assert_eq!(stored, v);
    }

    #[test]
    fn test_source_from_parts() {
        assert!(matches!(
            VersionSource::from_parts(Some("a".into()), Some(ContentHash::md5("x"))),
            Err(ModelError::InvalidArgument(_))
        ));
        assert!(matches!(
            VersionSource::from_parts(None, None),
            Err(ModelError::InvalidArgument(_))
        ));
        assert_eq!(
            VersionSource::from_parts(None, Some(ContentHash::md5("x"))).unwrap(),
            VersionSource::Hash(ContentHash::md5("x"))
        );
    }

    #[test]
    fn test_get_version_by_number_and_id() {
        let (repo, gateway, file) = setup();
        add_hashed(&repo, &gateway, &file, "a");
        let v2 = add_hashed(&repo, &gateway, &file, "b");

        let two = VersionNumber::new(2).unwrap();
        assert_eq!(file.get_version(&repo, VersionLookup::Number(two)).unwrap(), v2);
        assert_eq!(file.get_version(&repo, VersionLookup::Id(&v2.id)).unwrap(), v2);

        let missing = VersionNumber::new(9).unwrap();
        let err = file.get_version(&repo, VersionLookup::Number(missing)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_deleted_version_by_number() {
        let (repo, gateway, file) = setup();
        add_hashed(&repo, &gateway, &file, "a");
        file.delete_version(&repo, VersionNumber::FIRST).unwrap();

        let v = file.get_version(&repo, VersionLookup::Number(VersionNumber::FIRST)).unwrap();
        assert!(v.is_deleted());
    }

    #[test]
    fn test_latest_version_skips_deleted() {
        let (repo, gateway, file) = setup();
        assert!(file.latest_version(&repo).unwrap_err().is_not_found());

        add_hashed(&repo, &gateway, &file, "a");
        add_hashed(&repo, &gateway, &file, "b");
        file.delete_version(&repo, VersionNumber::new(2).unwrap()).unwrap();

        let latest = file.latest_version(&repo).unwrap();
        assert_eq!(latest.version_number, VersionNumber::FIRST);
    }

    #[test]
    fn test_list_versions_filters_deleted() {
        let (repo, gateway, file) = setup();
        for hash in ["a", "b", "c"] {
            add_hashed(&repo, &gateway, &file, hash);
        }
        file.delete_version(&repo, VersionNumber::new(2).unwrap()).unwrap();

        let live: Vec<u32> = file
            .list_versions(&repo, false)
            .unwrap()
            .iter()
            .map(|v| v.version_number.get())
            .collect();
        assert_eq!(live, vec![1, 3]);

        let all: Vec<u32> = file
            .list_versions(&repo, true)
            .unwrap()
            .iter()
            .map(|v| v.version_number.get())
            .collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_numbers_never_reused() {
        let (repo, gateway, file) = setup();
        add_hashed(&repo, &gateway, &file, "a");
        add_hashed(&repo, &gateway, &file, "b");
        file.delete_all_versions(&repo).unwrap();

        let v3 = add_hashed(&repo, &gateway, &file, "c");
        assert_eq!(v3.version_number.get(), 3);
    }

    #[test]
    fn test_can_delete_tracks_versions() {
        let (repo, gateway, mut file) = setup();
        assert!(file.can_delete(&repo).unwrap());

        add_hashed(&repo, &gateway, &file, "a");
        add_hashed(&repo, &gateway, &file, "b");
        assert!(!file.can_delete(&repo).unwrap());
        assert!(matches!(
            file.delete(&repo).unwrap_err(),
            ModelError::DeleteConstraint { entity: EntityKind::File, .. }
        ));

        assert_eq!(file.delete_all_versions(&repo).unwrap(), 2);
        assert!(file.can_delete(&repo).unwrap());
        file.delete(&repo).unwrap();
        assert!(repo.get_file(&file.id).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn test_draft_version_blocks_delete() {
        let (repo, _gateway, file) = setup();
        let draft = Version::new(file.id.clone(), VersionNumber::FIRST, StorageKind::Local);
        repo.add_version(&draft).unwrap();

        assert_eq!(draft.status, VersionStatus::Draft);
        assert!(!file.can_delete(&repo).unwrap());
    }

    /// Repository whose number allocation loses the race `races` times: each
    /// allocation inserts a competing version under the number it hands out.
    struct RacingRepository {
        inner: SqliteRepository,
        races: Cell<usize>,
    }

    impl RacingRepository {
        fn new(inner: SqliteRepository, races: usize) -> Self {
            Self {
                inner,
                races: Cell::new(races),
            }
        }
    }

    impl Repository for RacingRepository {
        fn add_collection(&self, collection: &Collection) -> ModelResult<()> {
            self.inner.add_collection(collection)
        }
        fn get_collection(&self, id: &CollectionId) -> ModelResult<Option<Collection>> {
            self.inner.get_collection(id)
        }
        fn get_collection_by_name(&self, name: &str) -> ModelResult<Option<Collection>> {
            self.inner.get_collection_by_name(name)
        }
        fn list_collections(&self, include_deleted: bool) -> ModelResult<Vec<Collection>> {
            self.inner.list_collections(include_deleted)
        }
        fn update_collection(&self, collection: &Collection) -> ModelResult<()> {
            self.inner.update_collection(collection)
        }
        fn add_file(&self, file: &LogicalFile) -> ModelResult<()> {
            self.inner.add_file(file)
        }
        fn get_file(&self, id: &FileId) -> ModelResult<Option<LogicalFile>> {
            self.inner.get_file(id)
        }
        fn get_file_by_name(&self, collection_id: &CollectionId, name: &str) -> ModelResult<Option<LogicalFile>> {
            self.inner.get_file_by_name(collection_id, name)
        }
        fn list_files(&self, collection_id: &CollectionId, include_deleted: bool) -> ModelResult<Vec<LogicalFile>> {
            self.inner.list_files(collection_id, include_deleted)
        }
        fn update_file(&self, file: &LogicalFile) -> ModelResult<()> {
            self.inner.update_file(file)
        }
        fn add_version(&self, version: &Version) -> ModelResult<()> {
            self.inner.add_version(version)
        }
        fn get_version(&self, id: &VersionId) -> ModelResult<Option<Version>> {
            self.inner.get_version(id)
        }
        fn get_version_by_number(&self, file_id: &FileId, number: VersionNumber) -> ModelResult<Option<Version>> {
            self.inner.get_version_by_number(file_id, number)
        }
        fn latest_version(&self, file_id: &FileId) -> ModelResult<Option<Version>> {
            self.inner.latest_version(file_id)
        }
        fn list_versions(&self, file_id: &FileId, include_deleted: bool) -> ModelResult<Vec<Version>> {
            self.inner.list_versions(file_id, include_deleted)
        }
        fn update_version(&self, version: &Version) -> ModelResult<()> {
            self.inner.update_version(version)
        }
        fn next_version_number(&self, file_id: &FileId) -> ModelResult<VersionNumber> {
            let number = self.inner.next_version_number(file_id)?;
            if self.races.get() > 0 {
                self.races.set(self.races.get() - 1);
                let mut rival = Version::new(file_id.clone(), number, StorageKind::Local);
                rival.commit_with_hash(ContentHash::md5(format!("rival{number}")))?;
                self.inner.add_version(&rival)?;
            }
            Ok(number)
        }
        fn query_lineage(&self, version_id: &VersionId, max_depth: usize) -> ModelResult<Vec<Version>> {
            self.inner.query_lineage(version_id, max_depth)
        }
        fn close(&self) -> ModelResult<()> {
            self.inner.close()
        }
    }

    #[test]
    fn test_add_version_retries_taken_number() {
        let (repo, gateway, file) = setup();
        let racing = RacingRepository::new(repo, 1);

        let v = file
            .add_version(&racing, &gateway, NewVersion::from_hash(ContentHash::md5("mine")))
            .unwrap();

        assert_eq!(v.version_number.get(), 2);
        let stored = racing.get_version_by_number(&file.id, VersionNumber::new(2).unwrap()).unwrap().unwrap();
        assert_eq!(stored.id, v.id);
        let rival = racing.get_version_by_number(&file.id, VersionNumber::FIRST).unwrap().unwrap();
        assert_eq!(rival.hash, ContentHash::md5("rival1"));
    }

    #[test]
    fn test_add_version_gives_up_after_max_attempts() {
        let (repo, gateway, file) = setup();
        let racing = RacingRepository::new(repo, MAX_ALLOCATION_ATTEMPTS);

        let err = file
            .add_version(&racing, &gateway, NewVersion::from_hash(ContentHash::md5("mine")))
            .unwrap_err();

        assert!(matches!(err, ModelError::VersionConflict { number, .. } if number == MAX_ALLOCATION_ATTEMPTS as u32));
        assert!(err.is_conflict());
        assert_eq!(racing.list_versions(&file.id, true).unwrap().len(), MAX_ALLOCATION_ATTEMPTS);
    }

    #[test]
    fn test_unknown_source_version_is_accepted() {
        let (repo, gateway, file) = setup();
        let v = file
            .add_version(
                &repo,
                &gateway,
                NewVersion::from_hash(ContentHash::md5("x")).derived_from(VersionId::new("ghost")),
            )
            .unwrap();

        let stored = repo.get_version(&v.id).unwrap().unwrap();
        assert_eq!(stored.source_version_id, Some(VersionId::new("ghost")));
    }

    #[test]
    fn test_lineage_pointer_is_recorded() {
        let (repo, gateway, file) = setup();
        let v1 = add_hashed(&repo, &gateway, &file, "a");
        let v2 = file
            .add_version(
                &repo,
                &gateway,
                NewVersion::from_hash(ContentHash::md5("b"))
                    .derived_from(v1.id.clone())
                    .transformer("dedupe"),
            )
            .unwrap();

        let stored = repo.get_version(&v2.id).unwrap().unwrap();
        assert_eq!(stored.source_version_id, Some(v1.id));
        assert_eq!(stored.transformer, "dedupe");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_next_number_follows_adds(count in 0usize..12) {
            let (repo, gateway, file) = setup();
            for i in 0..count {
                add_hashed(&repo, &gateway, &file, &format!("h{i}"));
            }
            let next = repo.next_version_number(&file.id).unwrap();
            prop_assert_eq!(next.get() as usize, count + 1);
        }
    }
}
