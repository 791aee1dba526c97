//! Mapping version addresses to stored versions.

use std::fmt;

use serde::Serialize;

use super::uri::VersionUri;
use crate::model::{ModelResult, Repository, Version, VersionNumber};

/// Outcome of resolving an address.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The addressed version. Its hash may be empty if it was never pushed.
    Found(Version),
    /// The collection, file or pinned version does not exist.
    NotFound,
}

impl Resolution {
    pub fn version(&self) -> Option<&Version> {
        match self {
            Resolution::Found(version) => Some(version),
            Resolution::NotFound => None,
        }
    }

    pub fn into_version(self) -> Option<Version> {
        match self {
            Resolution::Found(version) => Some(version),
            Resolution::NotFound => None,
        }
    }
}

/// Resolve `uri` to the pinned version, or to the latest committed one.
///
/// A pinned number only matches versions that are not deleted.
pub fn resolve(repo: &dyn Repository, uri: &VersionUri) -> ModelResult<Resolution> {
    let Some(collection) = repo.get_collection_by_name(&uri.collection)? else {
        return Ok(Resolution::NotFound);
    };
    let Some(file) = repo.get_file_by_name(&collection.id, &uri.file)? else {
        return Ok(Resolution::NotFound);
    };

    let version = match uri.pinned {
        Some(number) => repo
            .get_version_by_number(&file.id, number)?
            .filter(|v| !v.is_deleted()),
        None => repo.latest_version(&file.id)?,
    };
    Ok(version.map_or(Resolution::NotFound, Resolution::Found))
}

/// What a pipeline records about an input so later runs can detect change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub hash: String,
    pub hash_algorithm: String,
    pub version_number: VersionNumber,
    pub collection: String,
    pub file: String,
}

impl DependencyInfo {
    pub fn new(uri: &VersionUri, version: &Version) -> Self {
        Self {
            hash: version.hash.value.clone(),
            hash_algorithm: version.hash.algorithm.clone(),
            version_number: version.version_number,
            collection: uri.collection.clone(),
            file: uri.file.clone(),
        }
    }
}

/// Change status of a pipeline input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Unchanged,
    /// Nothing was recorded yet.
    New,
    /// The address now resolves to different content.
    Modified,
    /// Something was recorded but the address no longer resolves.
    Deleted,
}

impl DependencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyStatus::Unchanged => "unchanged",
            DependencyStatus::New => "new",
            DependencyStatus::Modified => "modified",
            DependencyStatus::Deleted => "deleted",
        }
    }

    pub fn is_changed(&self) -> bool {
        !matches!(self, DependencyStatus::Unchanged)
    }
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compare what `uri` resolves to now with the hash recorded earlier.
///
/// A missing address is `Deleted` only if a non-empty hash was recorded.
/// An empty recorded hash still compares against a found version.
pub fn dependency_status(
    repo: &dyn Repository,
    uri: &VersionUri,
    recorded: Option<&str>,
) -> ModelResult<DependencyStatus> {
    let status = match (resolve(repo, uri)?, recorded) {
        (Resolution::NotFound, Some(hash)) if !hash.is_empty() => DependencyStatus::Deleted,
        (Resolution::NotFound, _) | (Resolution::Found(_), None) => DependencyStatus::New,
        (Resolution::Found(version), Some(hash)) if version.hash.value != hash => {
            DependencyStatus::Modified
        }
        (Resolution::Found(_), Some(_)) => DependencyStatus::Unchanged,
    };
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::model::{Collection, ContentHash, LogicalFile, NewVersion};
    use crate::store::SqliteRepository;

    fn setup() -> (SqliteRepository, MemoryGateway, LogicalFile) {
        let repo = SqliteRepository::in_memory();
        let collection = Collection::new("cifar");
        repo.add_collection(&collection).unwrap();
        let file = collection.add_child(&repo, "train.csv", "", "").unwrap();
        (repo, MemoryGateway::new(), file)
    }

    fn uri(s: &str) -> VersionUri {
        s.parse().unwrap()
    }

    #[test]
    fn test_resolve_latest_and_pinned() {
        let (repo, gateway, file) = setup();
        for hash in ["aaa", "bbb"] {
            file.add_version(&repo, &gateway, NewVersion::from_hash(ContentHash::md5(hash)))
                .unwrap();
        }

        let latest = resolve(&repo, &uri("versiondb://cifar/train.csv")).unwrap();
        assert_eq!(latest.version().unwrap().hash.value, "bbb");

        let pinned = resolve(&repo, &uri("versiondb://cifar/train.csv@v1")).unwrap();
        assert_eq!(pinned.version().unwrap().hash.value, "aaa");

        let missing = resolve(&repo, &uri("versiondb://cifar/train.csv@v7")).unwrap();
        assert_eq!(missing, Resolution::NotFound);
        assert_eq!(
            resolve(&repo, &uri("versiondb://mnist/train.csv")).unwrap(),
            Resolution::NotFound
        );
        assert_eq!(
            resolve(&repo, &uri("versiondb://cifar/test.csv")).unwrap(),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_pinned_deleted_version_is_not_found() {
        let (repo, gateway, file) = setup();
        file.add_version(&repo, &gateway, NewVersion::from_hash(ContentHash::md5("a")))
            .unwrap();
        file.delete_version(&repo, VersionNumber::FIRST).unwrap();

        let res = resolve(&repo, &uri("versiondb://cifar/train.csv@v1")).unwrap();
        assert_eq!(res, Resolution::NotFound);
    }

    #[test]
    fn test_dependency_status() {
        let (repo, gateway, file) = setup();
        let target = uri("versiondb://cifar/train.csv");

        assert_eq!(dependency_status(&repo, &target, None).unwrap(), DependencyStatus::New);
        assert_eq!(dependency_status(&repo, &target, Some("")).unwrap(), DependencyStatus::New);
        assert_eq!(
            dependency_status(&repo, &target, Some("old")).unwrap(),
            DependencyStatus::Deleted
        );

        let v1 = file
            .add_version(&repo, &gateway, NewVersion::from_hash(ContentHash::md5("aaa")))
            .unwrap();
        assert_eq!(dependency_status(&repo, &target, None).unwrap(), DependencyStatus::New);
        assert_eq!(
            dependency_status(&repo, &target, Some("")).unwrap(),
            DependencyStatus::Modified
        );
        assert_eq!(
            dependency_status(&repo, &target, Some("aaa")).unwrap(),
            DependencyStatus::Unchanged
        );
        assert_eq!(
            dependency_status(&repo, &target, Some("zzz")).unwrap(),
            DependencyStatus::Modified
        );

        let info = DependencyInfo::new(&target, &v1);
        assert_eq!(info.hash, "aaa");
        assert_eq!(info.version_number, VersionNumber::FIRST);
        assert_eq!(info.collection, "cifar");
    }
}
